//! Quality checks run before a checkpoint.
//!
//! Images: 3:4 aspect ratio, minimum resolution and file size. Content: a 0-100 score
//! from title length, hook words, emoji count, block count, keywords and a call to
//! action. Problems are returned as warnings for the checkpoint, never as errors.

use std::path::Path;

use crate::document::ParsedDocument;

pub const TARGET_RATIO: f32 = 3.0 / 4.0;
pub const RATIO_TOLERANCE: f32 = 0.05;
pub const MIN_WIDTH: u32 = 1080;
pub const MIN_HEIGHT: u32 = 1440;
pub const MAX_FILE_KB: f64 = 2048.0;
pub const MIN_FILE_KB: f64 = 50.0;

// ────────────────────────────────────────────────────────────────────────────
// Images
// ────────────────────────────────────────────────────────────────────────────

/// Warnings for one image on disk.
pub fn check_image(path: &Path) -> Vec<String> {
    let mut issues = match image::image_dimensions(path) {
        Ok((width, height)) => check_dimensions(width, height),
        Err(e) => return vec![format!("{}: cannot read image ({e})", path.display())],
    };
    match std::fs::metadata(path) {
        Ok(meta) => issues.extend(check_file_size(meta.len())),
        Err(e) => issues.push(format!("cannot read file size ({e})")),
    }
    issues
        .into_iter()
        .map(|issue| format!("{}: {issue}", path.display()))
        .collect()
}

/// Over 2 MB is too heavy to upload comfortably; under 50 KB is usually a blank or
/// badly compressed render.
pub fn check_file_size(bytes: u64) -> Option<String> {
    let kb = bytes as f64 / 1024.0;
    if kb > MAX_FILE_KB {
        Some(format!("file is {kb:.1} KB, over 2 MB; consider compressing"))
    } else if kb < MIN_FILE_KB {
        Some(format!("file is only {kb:.1} KB, quality may be poor"))
    } else {
        None
    }
}

pub fn check_dimensions(width: u32, height: u32) -> Vec<String> {
    let mut issues = Vec::new();
    if height == 0 {
        issues.push("image has zero height".to_string());
        return issues;
    }

    let ratio = width as f32 / height as f32;
    if (ratio - TARGET_RATIO).abs() > RATIO_TOLERANCE {
        issues.push(format!("aspect ratio {ratio:.2} is not 3:4"));
    }
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        issues.push(format!(
            "resolution {width}x{height} is below {MIN_WIDTH}x{MIN_HEIGHT}"
        ));
    }
    issues
}

// ────────────────────────────────────────────────────────────────────────────
// Content
// ────────────────────────────────────────────────────────────────────────────

const HOOK_WORDS: &[&str] = &["卧槽", "震惊", "神器", "必看", "爆款", "秘密", "揭秘", "绝了"];
const KEYWORDS: &[&str] = &["工具", "神器", "效率", "方法", "技巧", "推荐"];
const CALL_TO_ACTION: &[&str] = &["点赞", "收藏", "关注", "分享", "评论"];

#[derive(Debug, Clone, PartialEq)]
pub struct ContentReport {
    /// 0-100, starting from 100 with a deduction per finding.
    pub score: u8,
    pub suggestions: Vec<String>,
}

impl ContentReport {
    /// Checkpoint warnings: nothing when there is nothing to suggest.
    pub fn warnings(&self) -> Vec<String> {
        if self.suggestions.is_empty() {
            return Vec::new();
        }
        std::iter::once(format!("content score {}/100", self.score))
            .chain(self.suggestions.iter().map(|s| format!("content: {s}")))
            .collect()
    }
}

/// Scores a parsed document. The title is the `title` metadata, else the first `# `
/// heading in the body.
pub fn check_content_quality(doc: &ParsedDocument) -> ContentReport {
    let body: Vec<&str> = doc.blocks.iter().map(|b| b.raw_text()).collect();
    let text = doc
        .metadata
        .values()
        .map(String::as_str)
        .chain(body.iter().copied())
        .collect::<Vec<_>>()
        .join("\n");

    let mut score: i32 = 100;
    let mut suggestions = Vec::new();
    let mut deduct = |points: i32, suggestion: &str| {
        score -= points;
        suggestions.push(suggestion.to_string());
    };

    let title = doc
        .title()
        .map(str::to_string)
        .or_else(|| first_title_heading(&body));
    match title {
        Some(title) => {
            let len = title.chars().count();
            if len > 25 {
                deduct(10, "title is long, keep it within 25 characters");
            } else if len < 8 {
                deduct(5, "title is short, aim for at least 8 characters");
            }
            if !HOOK_WORDS.iter().any(|w| title.contains(w)) {
                deduct(5, "title could use a stronger hook word");
            }
        }
        None => deduct(15, "no title"),
    }

    let emoji = text.chars().filter(|c| is_emoji(*c)).count();
    if emoji < 5 {
        deduct(5, "add a few more emoji");
    } else if emoji > 20 {
        deduct(3, "too many emoji, trim some");
    }

    if doc.blocks.len() < 3 {
        deduct(10, "split the body into more blocks");
    } else if doc.blocks.len() > 8 {
        deduct(5, "too many blocks, merge related ones");
    }

    let keywords: usize = KEYWORDS.iter().map(|k| text.matches(k).count()).sum();
    if keywords < 3 {
        deduct(5, "use more topic keywords");
    }

    if !CALL_TO_ACTION.iter().any(|w| text.contains(w)) {
        deduct(8, "add a call to action (like, save, follow)");
    }

    ContentReport {
        score: score.clamp(0, 100) as u8,
        suggestions,
    }
}

fn first_title_heading(blocks: &[&str]) -> Option<String> {
    blocks
        .iter()
        .flat_map(|b| b.lines())
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
}

fn is_emoji(c: char) -> bool {
    matches!(
        c,
        '\u{1F600}'..='\u{1F64F}'
            | '\u{1F300}'..='\u{1F5FF}'
            | '\u{1F680}'..='\u{1F6FF}'
            | '\u{26A0}'..='\u{26A1}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_card_passes() {
        assert!(check_dimensions(1080, 1440).is_empty());
        assert!(check_dimensions(1536, 2048).is_empty());
    }

    #[test]
    fn test_wrong_ratio_flagged() {
        let issues = check_dimensions(1080, 1080);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("aspect ratio 1.00"));
    }

    #[test]
    fn test_small_image_flagged() {
        let issues = check_dimensions(540, 720);
        assert_eq!(issues, vec!["resolution 540x720 is below 1080x1440".to_string()]);
    }

    #[test]
    fn test_zero_height() {
        assert_eq!(check_dimensions(10, 0).len(), 1);
    }

    #[test]
    fn test_check_image_reads_png_header_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbImage::new(30, 40).save(&path).unwrap();
        let issues = check_image(&path);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("30x40"));
        assert!(issues[1].contains("quality may be poor"));
    }

    #[test]
    fn test_file_size_bounds() {
        assert!(check_file_size(300 * 1024).is_none());
        assert!(check_file_size(49 * 1024).unwrap().contains("49.0 KB"));
        assert!(check_file_size(3 * 1024 * 1024).unwrap().contains("over 2 MB"));
        assert!(check_file_size(2048 * 1024).is_none());
    }

    fn parsed(text: &str) -> ParsedDocument {
        use crate::document::{FrontMatterParser, MarkdownParser};
        FrontMatterParser::default().parse(text)
    }

    #[test]
    fn test_strong_content_scores_full_marks() {
        let doc = parsed(
            "---\ntitle: 5个提升效率的神器工具推荐\nemoji: 🚀\n---\n\
             😀 Notion 笔记工具\n---\n😎 Obsidian 效率方法\n---\n🎉 Raycast 技巧\n---\n\
             🔥 觉得有用记得点赞收藏",
        );
        let report = check_content_quality(&doc);
        assert_eq!(report.score, 100, "{:?}", report.suggestions);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_weak_content_collects_deductions() {
        let report = check_content_quality(&parsed("只有一段话"));
        // no title 15, emoji 5, blocks 10, keywords 5, call to action 8
        assert_eq!(report.score, 57);
        assert_eq!(report.suggestions.len(), 5);
        let warnings = report.warnings();
        assert_eq!(warnings[0], "content score 57/100");
        assert!(warnings.iter().any(|w| w.contains("no title")));
    }

    #[test]
    fn test_title_falls_back_to_first_heading() {
        let report = check_content_quality(&parsed("# 短\n正文\n---\n二\n---\n三"));
        assert!(report.suggestions.iter().any(|s| s.contains("title is short")));
        assert!(!report.suggestions.iter().any(|s| s == "no title"));
    }

    #[test]
    fn test_long_title_and_emoji_flood() {
        let flood = "🚀".repeat(21);
        let doc = parsed(&format!(
            "---\ntitle: {}\n---\n{flood}\n---\nb\n---\nc",
            "很长的标题".repeat(6)
        ));
        let report = check_content_quality(&doc);
        assert!(report.suggestions.iter().any(|s| s.contains("25 characters")));
        assert!(report.suggestions.iter().any(|s| s.contains("too many emoji")));
    }

    #[test]
    fn test_check_image_unreadable() {
        let issues = check_image(Path::new("/nonexistent/card.png"));
        assert!(issues[0].contains("cannot read image"));
    }
}
