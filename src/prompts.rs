pub const DESCRIBE_USER: &str = include_str!("../data/prompts/describe_user.txt");
pub const TTS_SYSTEM: &str = include_str!("../data/prompts/tts_system.txt");

/// Bundled prompts keep a trailing newline on disk; the wire format doesn't want it.
pub fn trimmed(prompt: &str) -> String {
    prompt.trim().to_string()
}
