//! Video playback seam.
//!
//! The controller never talks to a real player directly; the embedding
//! application injects whatever drives its reference video (an HTML video
//! element, a media framework, a test double).

/// Playback control for the reference video.
pub trait VideoPlayer {
    fn play(&mut self);
    fn pause(&mut self);
    /// Jump to an absolute position in seconds.
    fn seek(&mut self, position_secs: f64);
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;
}

/// Player for sessions without a reference video (image or document
/// references). Time never advances, so timestamped pauses never fire.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl VideoPlayer for NullPlayer {
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn seek(&mut self, _position_secs: f64) {}
    fn current_time(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::VideoPlayer;

    /// Scriptable player for controller tests: position is set directly and
    /// play/pause calls are recorded.
    #[derive(Debug, Default)]
    pub struct FakePlayer {
        pub position: f64,
        pub playing: bool,
        pub seeks: Vec<f64>,
    }

    impl VideoPlayer for FakePlayer {
        fn play(&mut self) {
            self.playing = true;
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn seek(&mut self, position_secs: f64) {
            self.position = position_secs;
            self.seeks.push(position_secs);
        }

        fn current_time(&self) -> f64 {
            self.position
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_player_time_never_advances() {
        let mut player = NullPlayer;
        player.play();
        player.seek(120.0);
        assert_eq!(player.current_time(), 0.0);
    }
}
