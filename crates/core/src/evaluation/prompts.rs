// All LLM prompt constants for the evaluation pipeline. Every template
// demands a bare JSON object; the balanced-brace extractor tolerates models
// that wrap it in prose or fences anyway.

/// System prompt for competency analysis — enforces JSON-only output.
pub const COMPETENCY_SYSTEM: &str =
    "You are an expert system design interview assessor. \
    Score the candidate's performance across fixed competency dimensions. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Competency analysis prompt template. Replace `{transcript}` before sending.
pub const COMPETENCY_PROMPT_TEMPLATE: &str = r#"Score the candidate in the following interview transcript on each of these competencies: problem_comprehension, requirements_gathering, architecture_design, scalability, tradeoff_analysis, communication, technical_depth.

Return a JSON object with this EXACT schema (one entry per competency, no extras):
{
  "scores": [
    {
      "competency": "problem_comprehension",
      "score": 72.5,
      "confidence": "high",
      "evidence": ["verbatim excerpt from the candidate supporting the score"]
    }
  ]
}

Rules:
- "score" is a number from 0 to 100.
- "confidence" is one of "low", "medium", "high" — how well the transcript covers that dimension.
- "evidence" holds 1-3 VERBATIM candidate excerpts; use an empty list when the transcript never touches the dimension.

TRANSCRIPT:
{transcript}"#;

/// System prompt for feedback generation — enforces JSON-only output.
pub const FEEDBACK_SYSTEM: &str =
    "You are an expert interview coach writing candid, specific feedback. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Feedback prompt template. Replace `{transcript}` and `{scores_json}`.
pub const FEEDBACK_PROMPT_TEMPLATE: &str = r#"Write categorized feedback for the candidate based on the transcript and competency scores below.

Return a JSON object with this EXACT schema:
{
  "went_well": [
    {"description": "what worked and why", "evidence": ["verbatim excerpt"]}
  ],
  "went_okay": [
    {"description": "adequate but improvable", "evidence": []}
  ],
  "needs_improvement": [
    {"description": "specific gap and its cost", "evidence": ["verbatim excerpt"]}
  ]
}

Rules:
- 3 to 5 went_well items, 2 to 4 went_okay items, 2 to 4 needs_improvement items.
- Every description names a concrete behavior, never a platitude.

COMPETENCY SCORES:
{scores_json}

TRANSCRIPT:
{transcript}"#;

/// System prompt for improvement plan generation — enforces JSON-only output.
pub const PLAN_SYSTEM: &str =
    "You are an expert interview coach building a concrete practice plan. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Improvement plan prompt template. Replace `{focus_areas}` and
/// `{scores_json}`.
pub const PLAN_PROMPT_TEMPLATE: &str = r#"Build an improvement plan targeting the candidate's weakest competencies: {focus_areas}.

Return a JSON object with this EXACT schema:
{
  "steps": [
    {
      "step": 1,
      "description": "one concrete practice action",
      "resources": ["a specific book, course, or exercise"]
    }
  ],
  "general_resources": ["broadly useful resource"]
}

Rules:
- 5 to 7 numbered steps, ordered from highest-leverage to lowest.
- Each step is actionable within a week; no vague advice.
- 2 to 4 general_resources.

COMPETENCY SCORES:
{scores_json}"#;
