// Prompt building for image enhancement.
// Content themes are detected from the image file name; the table is injected so callers
// can swap it without touching the enhancer.

use serde::{Deserialize, Serialize};

use crate::enhance::{EnhanceIntensity, EnhanceStyle};

pub const DEFAULT_THEME: &str = "lifestyle";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTheme {
    pub id: String,
    /// Substrings of a file name that select this theme.
    pub keywords: Vec<String>,
    pub colors: Vec<String>,
    pub elements: Vec<String>,
    pub mood: String,
    pub background: String,
    /// Theme-specific things to avoid.
    pub avoid: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceThemes {
    /// Checked in order; the first keyword hit wins.
    themes: Vec<ContentTheme>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl EnhanceThemes {
    pub fn new(themes: Vec<ContentTheme>) -> Self {
        Self { themes }
    }

    pub fn builtin() -> Self {
        let theme = |id: &str,
                     keywords: &[&str],
                     colors: &[&str],
                     elements: &[&str],
                     mood: &str,
                     background: &str,
                     avoid: &[&str]| ContentTheme {
            id: id.to_string(),
            keywords: strings(keywords),
            colors: strings(colors),
            elements: strings(elements),
            mood: mood.to_string(),
            background: background.to_string(),
            avoid: strings(avoid),
        };

        Self::new(vec![
            theme(
                "tech",
                &["工具", "软件", "App", "效率", "技术", "数字化", "AI", "科技"],
                &["蓝色", "紫色", "青色", "银灰色"],
                &["几何图形", "线条", "电路图案", "齿轮图标", "数据图表"],
                "现代感、科技感、简洁专业",
                "渐变几何背景，科技感线条装饰",
                &["卡通化", "幼稚", "过于花哨", "不专业"],
            ),
            theme(
                "lifestyle",
                &["生活", "日常", "分享", "体验", "感受", "家居", "美好"],
                &["粉色", "橙色", "米色", "薄荷绿"],
                &["手绘图标", "植物元素", "咖啡杯", "书本", "星星装饰"],
                "温馨、舒适、生活化、亲和力",
                "柔和渐变背景，手绘装饰元素",
                &["冷漠", "机械感", "过于正式", "商业化"],
            ),
            theme(
                "food",
                &["美食", "餐厅", "料理", "食谱", "味道", "烹饪", "甜品"],
                &["橙红色", "金黄色", "奶油色", "草莓粉"],
                &["食物图标", "餐具", "植物叶子", "几何图形"],
                "诱人、温暖、美味、精致",
                "美食主题渐变背景，精致装饰图案",
                &["不新鲜", "无食欲", "单调", "不诱人"],
            ),
            theme(
                "education",
                &["学习", "教程", "技能", "知识", "方法", "教育", "培训"],
                &["绿色", "蓝色", "黄色", "白色"],
                &["书本图标", "铅笔", "灯泡", "箭头", "对勾"],
                "专业、清晰、启发性、知识感",
                "教育主题背景，学习元素装饰",
                &["娱乐化", "不专业", "分散注意力", "幼稚"],
            ),
            theme(
                "business",
                &["商业", "创业", "投资", "管理", "营销", "职场", "成功"],
                &["深蓝色", "金色", "灰色", "白色"],
                &["图表", "箭头", "建筑", "握手", "目标"],
                "专业、权威、商务、成功",
                "商务风格背景，专业图形装饰",
                &["随意", "不正式", "缺乏权威感", "过于活泼"],
            ),
        ])
    }

    /// Theme whose keyword appears in `name` (case-insensitive), else the default theme.
    pub fn detect(&self, name: &str) -> Option<&ContentTheme> {
        let name = name.to_lowercase();
        self.themes
            .iter()
            .find(|t| t.keywords.iter().any(|k| name.contains(&k.to_lowercase())))
            .or_else(|| self.themes.iter().find(|t| t.id == DEFAULT_THEME))
            .or_else(|| self.themes.first())
    }
}

struct IntensityProfile {
    description: &'static str,
    saturation: &'static str,
    density: &'static str,
}

fn intensity_profile(intensity: EnhanceIntensity) -> IntensityProfile {
    match intensity {
        EnhanceIntensity::Light => IntensityProfile {
            description: "轻度美化，主要改变背景色彩，保持原有设计的简洁性",
            saturation: "柔和",
            density: "稀疏",
        },
        EnhanceIntensity::Medium => IntensityProfile {
            description: "适度添加主题装饰元素，平衡美观性和可读性",
            saturation: "中等",
            density: "适中",
        },
        EnhanceIntensity::Heavy => IntensityProfile {
            description: "丰富的装饰元素和视觉效果，打造强烈的视觉冲击力",
            saturation: "饱和",
            density: "密集",
        },
    }
}

fn join_first(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join("/")
}

/// Full enhancement prompt for one card.
pub fn build_prompt(
    theme: &ContentTheme,
    is_cover: bool,
    style: EnhanceStyle,
    intensity: EnhanceIntensity,
) -> String {
    let profile = intensity_profile(intensity);
    let card_kind = if is_cover { "封面" } else { "内容" };
    let primary = theme.colors.first().map(String::as_str).unwrap_or("主题色");

    let sections = [
        format!(
            "将这张小红书{card_kind}卡片重新设计为高质量的{style}风格插画，主题为{}类内容，整体风格{}",
            theme.id,
            theme.mood,
            style = style.label()
        ),
        "【布局重排要求】：\n\
         - 智能重新排列文字内容，避免所有内容挤在上方\n\
         - 主标题放在视觉焦点位置（上1/3或中心偏上）\n\
         - 副标题和正文内容错落有致，形成视觉层次\n\
         - 文字大小层次分明：主标题>副标题>正文>装饰文字"
            .to_string(),
        format!(
            "背景设计：使用{}的{}渐变背景，{}，背景装饰不能干扰文字阅读，保持适当的对比度",
            join_first(&theme.colors, 3),
            profile.saturation,
            theme.background
        ),
        format!(
            "装饰元素：在合适位置添加{}等主题相关的装饰，图标采用{}风格绘制，装饰密度为{}，不遮挡重要文字信息",
            join_first(&theme.elements, 4),
            style.label(),
            profile.density
        ),
        format!(
            "【文字重新设计】：\n\
             - 保持原有文字内容不变，但重新设计排版布局\n\
             - 主标题：字体加大，使用{primary}或对比色突出\n\
             - 正文：清晰易读，行间距适中\n\
             - 文字与背景对比度充足，确保可读性"
        ),
        "质量要求：输出3:4比例高清图片，适合小红书平台发布，整体风格统一协调".to_string(),
        format!("美化强度：{}", profile.description),
    ];

    sections.join("\n\n")
}

pub fn negative_prompt(theme: &ContentTheme) -> String {
    const BASE: [&str; 12] = [
        "文字模糊", "信息不清晰", "过度装饰", "颜色刺眼", "布局混乱", "装饰遮挡文字",
        "风格不统一", "低质量", "像素化", "变形", "扭曲", "不协调",
    ];
    BASE.iter()
        .map(|s| s.to_string())
        .chain(theme.avoid.iter().cloned())
        .collect::<Vec<_>>()
        .join(", ")
}
