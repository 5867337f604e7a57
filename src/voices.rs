//! Built-in catalog of edge-tts voices offered by the CLI.

pub const DEFAULT_VOICE: &str = "zh-CN-YunjianNeural";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub id: &'static str,
    pub label: &'static str,
}

pub const VOICES: &[Voice] = &[
    Voice { id: "zh-CN-YunjianNeural", label: "Yunjian (Mandarin, male)" },
    Voice { id: "zh-CN-XiaoxiaoNeural", label: "Xiaoxiao (Mandarin, female)" },
    Voice { id: "zh-CN-XiaoyiNeural", label: "Xiaoyi (Mandarin, female)" },
    Voice { id: "zh-CN-YunxiNeural", label: "Yunxi (Mandarin, male)" },
    Voice { id: "zh-CN-YunxiaNeural", label: "Yunxia (Mandarin, male)" },
    Voice { id: "zh-CN-YunyangNeural", label: "Yunyang (Mandarin, male)" },
    Voice { id: "en-US-JennyNeural", label: "Jenny (English, female)" },
    Voice { id: "en-US-GuyNeural", label: "Guy (English, male)" },
];

pub fn find(id: &str) -> Option<&'static Voice> {
    VOICES.iter().find(|v| v.id == id)
}

/// Sample sentence for a voice test, picked by the voice's language prefix.
pub fn sample_text(voice_id: &str) -> &'static str {
    if voice_id.starts_with("zh-") {
        "你好，这是一个语音测试。欢迎使用文本转语音批量转换工具。"
    } else {
        "Hello, this is a voice test. Welcome to the batch text-to-speech converter."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_is_in_catalog() {
        assert_eq!(find(DEFAULT_VOICE).map(|v| v.id), Some(DEFAULT_VOICE));
        assert_eq!(VOICES.len(), 8);
    }

    #[test]
    fn unknown_voice_is_not_found() {
        assert!(find("xx-XX-NobodyNeural").is_none());
    }

    #[test]
    fn sample_text_follows_language() {
        assert!(sample_text("en-US-GuyNeural").starts_with("Hello"));
        assert!(sample_text("zh-CN-XiaoyiNeural").starts_with("你好"));
    }
}
