// Prompt fragments shared by every caller of the LLM client.
// Task-specific templates live next to the code that uses them.

/// System prompt enforcing a single JSON object as output.
pub const JSON_ONLY_SYSTEM: &str = "You are an expert technical recruiter. \
    You MUST respond with one valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
