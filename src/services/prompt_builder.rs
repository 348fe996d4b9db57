//! 评分提示词构建
//!
//! 两种后端共用同一份提示词，模型必须只返回一个 JSON 对象。

use crate::config::{ContentRubric, GradingConfig};

/// 构建评分提示词
pub fn build_grading_prompt(config: &GradingConfig) -> String {
    let content_max = format_score(config.content_max);
    let language_max = format_score(config.language_max);
    let total_max = format_score(config.total_max());
    let content_points = format_rubric(&config.content_rubric);

    format!(
        r#"You are a strict English teacher grading for the Guangdong High School Entrance Exam.

Task Prompt: {task_prompt}

Grading Criteria (Guangdong High School Entrance Exam {total_max}-Point System):

1. Content (0-{content_max} points): Evaluate based on these required points:
{content_points}

2. Language (0-{language_max} points): Detailed grading criteria:
   - Error deduction: Every 3 minor errors deduct 1 point. The same error type should NOT be counted multiple times.
   - Tense requirement: If the task is about "从事某一爱好的经历" (experience of engaging in a hobby), failure to use simple past tense deducts 0.5 points.
   - Word count (60 words as baseline):
     * For every 10 words below 60, deduct 2 points.
     * Exceeding word count does NOT deduct points in this round.
     * However, if the text is excessively long (e.g., tiny handwriting filling the entire page densely), deduct 1 point.
   - Content completeness: If content is missing, the language score should also be reduced/downgraded.
   - Handwriting and corrections: Handwriting quality and corrections affect the score. If there are more than 3 corrections, full marks ({language_max} points) cannot be given. (Note: Official exam standard requires no full marks if more than 2 corrections.)
   - Full marks ({language_max} points) conditions:
     * Without complex sentences: No grammar errors, logical and reasonable.
     * With complex sentences: Has advanced sentence structures and vocabulary, but allows ONE non-communicative language error (e.g., singular/plural, spelling), still gives full marks.

Instructions:
- Recognize: Read the handwritten text from the image carefully. Transcribe all text accurately.
- Grade: Evaluate the essay based on the criteria above.
- Be strict but fair. Follow the Guangdong High School Entrance Exam grading standards.
- IMPORTANT: All comments (content_comment, language_comment, general_comment) MUST be written primarily in Chinese. Use Chinese for at least 80% of the comment content. You may include English terms or phrases only when necessary for technical accuracy (e.g., grammar terms, specific vocabulary).

Output: Return ONLY a valid JSON object with the following exact structure (use these exact field names):
{{
  "recognized_text": "The full transcribed text from the image...",
  "content_score": <number between 0 and {content_max}>,
  "language_score": <number between 0 and {language_max}>,
  "total_score": <sum of content_score and language_score>,
  "content_comment": "内容方面的具体反馈，说明哪些要点已覆盖或缺失（必须主要使用中文）...",
  "language_comment": "语法、词汇和语言使用方面的具体反馈（必须主要使用中文）...",
  "general_comment": "整体评估和改进建议（必须主要使用中文）..."
}}"#,
        task_prompt = config.task_prompt,
    )
}

/// 要点模式：编号列表；文本模式：原样嵌入
fn format_rubric(rubric: &ContentRubric) -> String {
    match rubric {
        ContentRubric::Text(text) => text.clone(),
        ContentRubric::Points(points) => points
            .iter()
            .filter(|p| !p.trim().is_empty())
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// 整数分值不带小数点（6 而不是 6.0）
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}
