//! Typing generated lines into the foreground application.
//!
//! On Windows, [`KeyboardTyper`] opens the game chat with a virtual key,
//! types each character as a Unicode `SendInput` keystroke, and submits
//! with Enter. Elsewhere only dry-run mode is usable.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use banter_core::config::TyperConfig;
use banter_core::error::BanterError;

/// Delivers a finished line to the user's chat.
#[async_trait]
pub trait Typer: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), BanterError>;
}

/// Cut `message` to at most `max_chars` characters.
///
/// Counts chars, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_message(message: &str, max_chars: usize) -> &str {
    match message.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &message[..byte_index],
        None => message,
    }
}

/// Timing and limits for [`KeyboardTyper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TyperSettings {
    pub open_chat_key: String,
    pub open_chat_delay: Duration,
    pub typing_interval: Duration,
    pub submit_delay: Duration,
    pub max_message_length: usize,
    pub dry_run: bool,
}

impl TyperSettings {
    pub fn from_config(config: &TyperConfig, dry_run: bool) -> Self {
        Self {
            open_chat_key: config.open_chat_key.clone(),
            open_chat_delay: Duration::from_millis(config.open_chat_delay_ms),
            typing_interval: Duration::from_millis(config.typing_interval_ms),
            submit_delay: Duration::from_millis(100),
            max_message_length: config.max_message_length,
            dry_run,
        }
    }
}

impl Default for TyperSettings {
    fn default() -> Self {
        Self::from_config(&TyperConfig::default(), false)
    }
}

/// Map a key name from the config to a Windows virtual-key code.
///
/// Single ASCII letters and digits map to their uppercase code; a few named
/// keys are supported for layouts that open chat differently.
pub fn parse_virtual_key(name: &str) -> Option<u16> {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphanumeric() {
            return Some(ch.to_ascii_uppercase() as u16);
        }
        return None;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "enter" | "return" => Some(0x0D),
        "tab" => Some(0x09),
        "space" => Some(0x20),
        _ => None,
    }
}

/// Simulated keyboard typer.
#[derive(Debug, Clone)]
pub struct KeyboardTyper {
    settings: TyperSettings,
    open_chat_vk: u16,
}

impl KeyboardTyper {
    pub fn new(settings: TyperSettings) -> Result<Self, BanterError> {
        let open_chat_vk = parse_virtual_key(&settings.open_chat_key).ok_or_else(|| {
            BanterError::Config(format!(
                "Unsupported open-chat key '{}'",
                settings.open_chat_key
            ))
        })?;
        Ok(Self {
            settings,
            open_chat_vk,
        })
    }

    pub fn settings(&self) -> &TyperSettings {
        &self.settings
    }

    fn prepare<'a>(&self, message: &'a str) -> &'a str {
        let limit = self.settings.max_message_length;
        let count = message.chars().count();
        if count > limit {
            warn!(
                length = count,
                limit, "Message exceeds chat limit, truncating"
            );
        }
        truncate_message(message, limit)
    }

    #[cfg(target_os = "windows")]
    async fn type_out(&self, message: &str) -> Result<(), BanterError> {
        win::press_virtual_key(self.open_chat_vk)?;
        tokio::time::sleep(self.settings.open_chat_delay).await;

        for ch in message.chars() {
            win::type_char(ch)?;
            if !self.settings.typing_interval.is_zero() {
                tokio::time::sleep(self.settings.typing_interval).await;
            }
        }

        tokio::time::sleep(self.settings.submit_delay).await;
        win::press_virtual_key(win::VK_ENTER)?;
        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    async fn type_out(&self, _message: &str) -> Result<(), BanterError> {
        warn!(
            vk = self.open_chat_vk,
            "KeyboardTyper: SendInput not available on this platform"
        );
        Err(BanterError::Dispatch(
            "Keyboard typing is only available on Windows".into(),
        ))
    }
}

#[async_trait]
impl Typer for KeyboardTyper {
    async fn send(&self, message: &str) -> Result<(), BanterError> {
        let text = self.prepare(message);
        if self.settings.dry_run {
            info!(message = %text, "[DRY-RUN] Would type message");
            return Ok(());
        }
        debug!(chars = text.chars().count(), "Typing message");
        self.type_out(text).await?;
        info!(message = %text, "Message sent");
        Ok(())
    }
}

/// Logs the line instead of typing it.
#[derive(Debug, Clone, Default)]
pub struct DebugTyper;

#[async_trait]
impl Typer for DebugTyper {
    async fn send(&self, message: &str) -> Result<(), BanterError> {
        info!(message = %message, "[DEBUG TYPER] Message");
        Ok(())
    }
}

#[cfg(target_os = "windows")]
mod win {
    use banter_core::error::BanterError;
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
        KEYEVENTF_UNICODE,
    };

    pub const VK_ENTER: u16 = 0x0D;

    fn key_input(vk: u16, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: scan,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn send(inputs: &[INPUT]) -> Result<(), BanterError> {
        let sent = unsafe {
            SendInput(
                inputs.len() as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        };
        if sent as usize != inputs.len() {
            return Err(BanterError::Dispatch(format!(
                "SendInput only sent {} of {} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }

    /// Press and release a virtual key.
    pub fn press_virtual_key(vk: u16) -> Result<(), BanterError> {
        send(&[key_input(vk, 0, 0), key_input(vk, 0, KEYEVENTF_KEYUP)])
    }

    /// Type one character as Unicode keystrokes (two for surrogate pairs).
    pub fn type_char(ch: char) -> Result<(), BanterError> {
        let mut units = [0u16; 2];
        let mut inputs = Vec::with_capacity(4);
        for &unit in ch.encode_utf16(&mut units).iter() {
            inputs.push(key_input(0, unit, KEYEVENTF_UNICODE));
            inputs.push(key_input(0, unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP));
        }
        send(&inputs)
    }
}
