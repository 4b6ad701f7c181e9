// Prompt constants for copy optimization.

/// System prompt for copy optimization. Enforces JSON-only output.
pub const COPY_SYSTEM: &str = "You are an experienced social-media copywriter for \
    image-card posts on Xiaohongshu. You rewrite notes so they hook readers in the first \
    line while keeping every fact from the source. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Copy optimization prompt. Replace `{frameworks}` and `{content}` before sending.
pub const COPY_PROMPT_TEMPLATE: &str = r#"Rewrite the note below as an image-card post.

Return a JSON object with this EXACT schema (no extra fields):
{
  "title_candidates": ["5 个效率神器，打工人必备！", "..."],
  "body_variants": {
    "problem_solution": "...",
    "tutorial": "...",
    "review": "...",
    "lifestyle": "..."
  }
}

Rules:
- 3 to 5 title candidates, best first, each at most 20 characters.
- One body per framework key: {frameworks}.
- Bodies are markdown. Separate cards with a line containing only `---`.
- Each card holds one idea and fits on a 3:4 card (about 200 Chinese characters).
- Keep the language of the source. Do not invent facts, prices or numbers.

FRAMEWORKS:
- problem_solution: pain point, solution, experience, results, recommendation
- tutorial: topic, preparation, steps, caveats, takeaway
- review: introduction, scenarios, pros and cons, comparison, verdict
- lifestyle: scene, feelings, details, reflection, attitude

Source note:
{content}
"#;
