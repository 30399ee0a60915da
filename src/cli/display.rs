//! Display utilities for the pomosync CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Status display
//! - Error messages

use crate::types::{IpcResponse, ResponseData, SessionKind};

/// Focus sessions per cycle, for the progress indicator.
const CYCLE_LENGTH: u32 = crate::timer::cycle::SESSIONS_PER_CYCLE;

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the daemon's message followed by a one-line summary.
    pub fn show_result(response: &IpcResponse) {
        for line in Self::result_lines(response) {
            println!("{}", line);
        }
    }

    /// Shows the full timer status.
    pub fn show_status(response: &IpcResponse) {
        for line in Self::status_lines(response) {
            println!("{}", line);
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn result_lines(response: &IpcResponse) -> Vec<String> {
        let mut lines = Vec::new();
        if !response.message.is_empty() {
            lines.push(format!("* {}", response.message));
        }
        if let Some(data) = &response.data {
            lines.push(format!(
                "  {} {} ({})",
                Self::session_name(data.current_session),
                data.remaining_label,
                Self::running_label(data)
            ));
        }
        lines
    }

    fn status_lines(response: &IpcResponse) -> Vec<String> {
        let Some(data) = &response.data else {
            return vec!["タイマーは起動していません".to_string()];
        };

        let mut lines = vec![
            format!("pomosync ステータス ({})", data.role),
            "─────────────────────────────".to_string(),
            format!("セッション: {}", Self::session_name(data.current_session)),
            format!("状態: {}", Self::running_label(data)),
            format!("残り時間: {}", data.remaining_label),
            format!(
                "サイクル: {} {}/{}",
                Self::progress(data.completed_focus_sessions),
                data.completed_focus_sessions,
                CYCLE_LENGTH
            ),
            format!(
                "設定: 集中 {}分 / 短い休憩 {}分 / 長い休憩 {}分",
                data.durations.focus_minutes,
                data.durations.short_break_minutes,
                data.durations.long_break_minutes
            ),
        ];
        if data.sessions_completed > 0 {
            lines.push(format!("完了したセッション: {}", data.sessions_completed));
        }
        lines
    }

    fn running_label(data: &ResponseData) -> &'static str {
        if data.cycle_complete {
            "サイクル完了"
        } else if data.is_running {
            "実行中"
        } else {
            "一時停止中"
        }
    }

    fn session_name(session: SessionKind) -> &'static str {
        match session {
            SessionKind::Focus => "集中",
            SessionKind::ShortBreak => "短い休憩",
            SessionKind::LongBreak => "長い休憩",
        }
    }

    /// Renders cycle progress as filled and empty dots.
    fn progress(completed: u32) -> String {
        let filled = completed.min(CYCLE_LENGTH) as usize;
        let empty = CYCLE_LENGTH as usize - filled;
        format!("{}{}", "●".repeat(filled), "○".repeat(empty))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DurationConfig;

    fn data(session: SessionKind, remaining: u32, running: bool) -> ResponseData {
        ResponseData {
            role: "primary".to_string(),
            current_session: session,
            remaining_seconds: remaining,
            remaining_label: crate::timer::format_remaining(remaining),
            is_running: running,
            completed_focus_sessions: 2,
            cycle_complete: false,
            sessions_completed: 0,
            last_completed_session: None,
            durations: DurationConfig::default(),
        }
    }

    mod progress_tests {
        use super::*;

        #[test]
        fn test_progress() {
            assert_eq!(Display::progress(0), "○○○○");
            assert_eq!(Display::progress(3), "●●●○");
            assert_eq!(Display::progress(4), "●●●●");
            assert_eq!(Display::progress(9), "●●●●");
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_result_lines() {
            let response = IpcResponse::success(
                "タイマーを開始しました",
                Some(data(SessionKind::Focus, 1500, true)),
            );
            let lines = Display::result_lines(&response);
            assert_eq!(lines[0], "* タイマーを開始しました");
            assert_eq!(lines[1], "  集中 25:00 (実行中)");
        }

        #[test]
        fn test_result_lines_without_data() {
            let response = IpcResponse::success("OK", None);
            assert_eq!(Display::result_lines(&response), vec!["* OK".to_string()]);
        }

        #[test]
        fn test_status_lines() {
            let mut d = data(SessionKind::ShortBreak, 93, false);
            d.sessions_completed = 3;
            let response = IpcResponse::success("", Some(d));
            let lines = Display::status_lines(&response);

            assert!(lines[0].contains("primary"));
            assert!(lines.contains(&"セッション: 短い休憩".to_string()));
            assert!(lines.contains(&"状態: 一時停止中".to_string()));
            assert!(lines.contains(&"残り時間: 01:33".to_string()));
            assert!(lines.contains(&"サイクル: ●●○○ 2/4".to_string()));
            assert!(lines.contains(&"完了したセッション: 3".to_string()));
        }

        #[test]
        fn test_status_cycle_complete() {
            let mut d = data(SessionKind::LongBreak, 0, false);
            d.cycle_complete = true;
            d.completed_focus_sessions = 4;
            let lines = Display::status_lines(&IpcResponse::success("", Some(d)));
            assert!(lines.contains(&"状態: サイクル完了".to_string()));
            assert!(lines.contains(&"サイクル: ●●●● 4/4".to_string()));
        }

        #[test]
        fn test_status_no_data() {
            let lines = Display::status_lines(&IpcResponse::success("", None));
            assert_eq!(lines, vec!["タイマーは起動していません".to_string()]);
        }

        #[test]
        fn test_show_functions_do_not_panic() {
            let response = IpcResponse::success("", Some(data(SessionKind::Focus, 60, true)));
            Display::show_result(&response);
            Display::show_status(&response);
            Display::show_error("Test error message");
        }
    }
}
