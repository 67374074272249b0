//! Prompts and schemas for drift-analysis and digitization calls.

use crate::overlay::NormalizedBox;

/// JSON schema for the structured verdict output.
/// Matches the Verdict type from reasoning::types.
pub fn verdict_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "enum": ["MATCH", "DRIFT"]
            },
            "severity": {
                "type": "string",
                "enum": ["LOW", "MEDIUM", "CRITICAL"],
                "description": "LOW when status is MATCH"
            },
            "anomaly_box": {
                "type": ["array", "null"],
                "items": { "type": "number" },
                "minItems": 4,
                "maxItems": 4,
                "description": "[x, y, width, height] on a 0-1000 scale, or null when nothing to highlight"
            },
            "message": {
                "type": "string",
                "description": "One short corrective or confirmatory sentence, in the requested language"
            }
        },
        "required": ["status", "severity", "message"],
        "additionalProperties": false
    })
}

/// JSON schema for the digitization output: an ordered step list.
pub fn step_list_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": "Instruction, 10 words or fewer"
                        },
                        "target_timestamp": {
                            "type": ["number", "null"],
                            "description": "Seconds offset into the reference video, null for non-video references"
                        },
                        "tools": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["text"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["steps"],
        "additionalProperties": false
    })
}

/// Build the drift-analysis prompt for the current step.
///
/// # Arguments
/// * `instruction` - Text of the active procedure step
/// * `language` - Language tag for the corrective message
/// * `hazard_zones` - Regions flagged as dangerous, in 0-1000 space
pub fn build_analysis_prompt(
    instruction: &str,
    language: &str,
    hazard_zones: &[NormalizedBox],
) -> String {
    let hazards = if hazard_zones.is_empty() {
        "none".to_string()
    } else {
        hazard_zones
            .iter()
            .map(|z| {
                format!(
                    "[x={:.0}, y={:.0}, w={:.0}, h={:.0}]",
                    z.x, z.y, z.width, z.height
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        r#"Compare the attached camera frame against the reference procedure.

Active instruction: {instruction}

Hazard zones (0-1000 normalized coordinates): {hazards}

Decide whether reality matches the instruction:
- MATCH: the scene is consistent with the instruction being performed correctly
- DRIFT: something deviates from the instruction or reference

When status is DRIFT, rate severity:
- LOW: cosmetic or ambiguous deviation, no action required yet
- MEDIUM: clear deviation that should be corrected before continuing
- CRITICAL: dangerous or procedure-breaking deviation, including any activity inside a hazard zone

Report anomaly_box as [x, y, width, height] on a 0-1000 scale covering the most
relevant deviating region, or null when there is nothing to highlight. Use the
same 0-1000 scale regardless of frame resolution.

Write the message as one short sentence in language "{language}": a correction
for DRIFT, a confirmation for MATCH.

If the frame is unusable (dark, blurred, not showing the work area), return
status MATCH with severity LOW and say so in the message."#,
        instruction = instruction,
        hazards = hazards,
        language = language,
    )
}

/// Build the digitization prompt turning reference material into steps.
pub fn build_digitize_prompt(language: &str) -> String {
    format!(
        r#"Read the attached reference material and break the procedure it shows
into an ordered list of steps.

For each step:
- text: the instruction in 10 words or fewer, in language "{language}"
- target_timestamp: for video references, the seconds offset where the step
  begins; null otherwise
- tools: names of tools visibly required, empty list if none

Keep the original order. Do not invent steps that are not shown."#,
        language = language,
    )
}
