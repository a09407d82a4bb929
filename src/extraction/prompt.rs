/// Instructions sent alongside the transcript. The content itself goes on stdin.
pub const DEFAULT_PROMPT: &str = r#"You are reviewing the transcript of a coding session provided on stdin.
Extract only the facts worth keeping after the conversation context is reset.

Respond with a single JSON object and nothing else:

{
  "extractions": [
    {
      "type": "decision" | "learning" | "guideline" | "implementation_plan" | "constraint" | "preference" | "discovery" | "reference",
      "content": "one self-contained sentence",
      "importance": "high" | "medium" | "low",
      "category": "optional short topic",
      "keywords": ["optional", "search", "terms"],
      "applies_when": "optional situation in which this applies"
    }
  ],
  "summary": "one or two sentences describing the session"
}

Rules:
- Prefer fewer, durable facts over many transient ones.
- Mark as high importance only decisions and rules that would cause mistakes if forgotten.
- Never include secrets, tokens or credentials.
- If nothing is worth keeping, return {"extractions": []}."#;
