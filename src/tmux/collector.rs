//! tmux state collection.
//!
//! Sessions, windows and panes come from three `tmux list-*` calls using
//! tab-separated `-F` formats. Lines with the wrong field count or a
//! non-numeric index are skipped rather than failing the snapshot.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

use super::{
    command::{self, CommandError, COMMAND_TIMEOUT},
    network,
    redact::mask_sensitive_text,
    Collector, NetworkState, Pane, PaneDetail, PaneProcess, PaneSession, PaneWindow,
    ProcessDetails, Session, TmuxState, Window,
};

const SESSION_FORMAT: &str =
    "#{session_id}\t#{session_name}\t#{session_windows}\t#{session_attached}";
const WINDOW_FORMAT: &str = "#{session_name}\t#{window_id}\t#{window_index}\t#{window_name}\t#{window_active}\t#{window_panes}";
const PANE_FORMAT: &str = "#{session_name}\t#{window_id}\t#{pane_id}\t#{pane_index}\t#{pane_active}\t#{pane_pid}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_title}";

/// Scrollback lines returned with a pane detail.
pub const CAPTURE_LINES: u32 = 200;

const TMUX_NOT_FOUND: &str = "tmux command not found";
const NO_SERVER: &str = "no running tmux server";

/// Collector backed by the local `tmux`, `ps` and `lsof` binaries.
#[derive(Clone, Debug, Default)]
pub struct SystemCollector;

impl SystemCollector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Collector for SystemCollector {
    #[instrument(skip(self))]
    async fn tmux_state(&self) -> TmuxState {
        let sessions_raw =
            match command::run("tmux", &["list-sessions", "-F", SESSION_FORMAT], COMMAND_TIMEOUT)
                .await
            {
                Err(CommandError::NotFound { .. }) => {
                    return TmuxState {
                        available: false,
                        running: false,
                        sessions: Vec::new(),
                        error: TMUX_NOT_FOUND.to_string(),
                    };
                }
                Ok(output) if output.success() => output.stdout.trim().to_string(),
                _ => String::new(),
            };
        if sessions_raw.is_empty() {
            return TmuxState {
                available: true,
                running: false,
                sessions: Vec::new(),
                error: NO_SERVER.to_string(),
            };
        }

        let windows_raw = command::capture("tmux", &["list-windows", "-a", "-F", WINDOW_FORMAT]).await;
        let panes_raw = command::capture("tmux", &["list-panes", "-a", "-F", PANE_FORMAT]).await;

        let mut panes = parse_panes(&panes_raw);
        for (_, pane) in &mut panes {
            pane.process = PaneProcess {
                details: process_details(&pane.pid).await,
            };
        }

        assemble_state(&sessions_raw, &windows_raw, panes)
    }

    async fn network_state(&self) -> NetworkState {
        network::collect().await
    }

    #[instrument(skip(self))]
    async fn pane_detail(&self, pane_id: &str) -> Option<PaneDetail> {
        let pane_id = pane_id.trim();
        if pane_id.is_empty() {
            return None;
        }

        let state = self.tmux_state().await;
        if !state.running {
            return None;
        }
        let (session, window, pane) = state.find_pane(pane_id)?;
        let output = capture_pane_output(pane_id).await;
        Some(PaneDetail {
            session: PaneSession {
                name: session.name.clone(),
                attached: session.attached,
            },
            window: PaneWindow {
                id: window.id.clone(),
                index: window.index,
                name: window.name.clone(),
                active: window.active,
            },
            pane: pane.clone(),
            output,
        })
    }
}

async fn capture_pane_output(pane_id: &str) -> String {
    let start = format!("-{CAPTURE_LINES}");
    match command::run(
        "tmux",
        &["capture-pane", "-p", "-t", pane_id, "-S", &start],
        COMMAND_TIMEOUT,
    )
    .await
    {
        Ok(output) if output.success() => output.stdout,
        _ => String::new(),
    }
}

async fn process_details(pid: &str) -> Option<ProcessDetails> {
    if pid.is_empty() || pid == "0" {
        return None;
    }
    let out = command::capture("ps", &["-p", pid, "-o", "pid=,ppid=,user=,etime=,command="]).await;
    parse_process_details(&out)
}

/// Parse one `ps -o pid=,ppid=,user=,etime=,command=` row.
#[must_use]
pub fn parse_process_details(out: &str) -> Option<ProcessDetails> {
    let [pid, ppid, user, elapsed, command]: [&str; 5] = split_fields(out, 5).try_into().ok()?;
    Some(ProcessDetails {
        pid: pid.to_string(),
        ppid: ppid.to_string(),
        user: user.to_string(),
        elapsed: elapsed.to_string(),
        command: mask_sensitive_text(command),
    })
}

/// Whitespace split into at most `max` fields; the last keeps the remainder.
pub(crate) fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim();
    while !rest.is_empty() && max > 0 {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

fn flag(value: &str) -> bool {
    value == "1"
}

/// Sessions keyed by name, from `list-sessions` output.
#[must_use]
pub fn parse_sessions(raw: &str) -> BTreeMap<String, Session> {
    raw.lines()
        .filter_map(|line| {
            let [_, name, window_count, attached] = fields::<4>(line)?;
            Some((
                name.to_string(),
                Session {
                    name: name.to_string(),
                    window_count: window_count.parse().ok()?,
                    attached: flag(attached),
                    windows: Vec::new(),
                },
            ))
        })
        .collect()
}

/// `(session_name, window)` pairs from `list-windows -a` output.
#[must_use]
pub fn parse_windows(raw: &str) -> Vec<(String, Window)> {
    raw.lines()
        .filter_map(|line| {
            let [session_name, id, index, name, active, pane_count] = fields::<6>(line)?;
            Some((
                session_name.to_string(),
                Window {
                    id: id.to_string(),
                    index: index.parse().ok()?,
                    name: name.to_string(),
                    active: flag(active),
                    pane_count: pane_count.parse().ok()?,
                    panes: Vec::new(),
                },
            ))
        })
        .collect()
}

/// `(window_id, pane)` pairs from `list-panes -a` output, without process details.
#[must_use]
pub fn parse_panes(raw: &str) -> Vec<(String, Pane)> {
    raw.lines()
        .filter_map(|line| {
            let [_, window_id, id, index, active, pid, current_command, current_path, title] =
                fields::<9>(line)?;
            Some((
                window_id.to_string(),
                Pane {
                    id: id.to_string(),
                    index: index.parse().ok()?,
                    active: flag(active),
                    pid: pid.to_string(),
                    current_command: current_command.to_string(),
                    current_path: current_path.to_string(),
                    title: title.to_string(),
                    process: PaneProcess::default(),
                },
            ))
        })
        .collect()
}

fn fields<const N: usize>(line: &str) -> Option<[&str; N]> {
    line.split('\t').collect::<Vec<_>>().try_into().ok()
}

/// Nest panes into windows and windows into sessions. Sessions are ordered
/// by name; windows and panes keep tmux's order. Orphans are dropped.
#[must_use]
pub fn assemble_state(sessions_raw: &str, windows_raw: &str, panes: Vec<(String, Pane)>) -> TmuxState {
    let mut sessions = parse_sessions(sessions_raw);
    let mut windows = parse_windows(windows_raw);

    let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, (_, window)) in windows.iter().enumerate() {
        by_id.entry(window.id.clone()).or_default().push(position);
    }
    for (window_id, pane) in panes {
        // Linked windows share an id across sessions.
        for position in by_id.get(&window_id).into_iter().flatten() {
            windows[*position].1.panes.push(pane.clone());
        }
    }

    for (session_name, window) in windows {
        if let Some(session) = sessions.get_mut(&session_name) {
            session.windows.push(window);
        }
    }

    TmuxState {
        available: true,
        running: true,
        sessions: sessions.into_values().collect(),
        error: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSIONS: &str = "$1\twork\t2\t1\n$0\tdev\t1\t0\nbroken line\n$2\tbad\tx\t0";
    const WINDOWS: &str = "work\t@1\t0\teditor\t1\t2\nwork\t@2\t1\tshell\t0\t1\ndev\t@3\t0\tmain\t1\t1\nghost\t@9\t0\torphan\t1\t1\nwork\t@4";
    const PANES: &str = "work\t@1\t%1\t0\t1\t100\tvim\t/home/u\tedit\nwork\t@1\t%2\t1\t0\t0\tbash\t/home/u\tsh\nwork\t@2\t%3\t0\t1\t102\tzsh\t/tmp\tt\ndev\t@3\t%4\tx\t1\t103\tbash\t/\tt";

    #[test]
    fn nests_and_sorts_sessions() {
        let state = assemble_state(SESSIONS, WINDOWS, parse_panes(PANES));
        assert!(state.available && state.running);
        assert!(state.error.is_empty());

        let names: Vec<&str> = state.sessions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["dev", "work"]);

        let work = &state.sessions[1];
        assert!(work.attached);
        assert_eq!(work.window_count, 2);
        assert_eq!(work.windows.len(), 2);
        assert_eq!(work.windows[0].panes.len(), 2);
        assert_eq!(work.windows[1].panes[0].id, "%3");

        // %4 has a non-numeric index.
        assert!(state.sessions[0].windows[0].panes.is_empty());
    }

    #[test]
    fn finds_pane_with_parents() {
        let state = assemble_state(SESSIONS, WINDOWS, parse_panes(PANES));
        let (session, window, pane) = state.find_pane("%2").expect("pane %2");
        assert_eq!(session.name, "work");
        assert_eq!(window.id, "@1");
        assert_eq!(pane.current_command, "bash");
        assert!(state.find_pane("%99").is_none());
    }

    #[test]
    fn linked_windows_get_panes_in_every_session() {
        let windows = "a\t@1\t0\tshared\t1\t1\nb\t@1\t3\tshared\t0\t1";
        let panes = parse_panes("a\t@1\t%1\t0\t1\t10\tbash\t/\tt");
        let state = assemble_state("$0\ta\t1\t0\n$1\tb\t1\t0", windows, panes);
        assert!(state.sessions.iter().all(|s| s.windows[0].panes.len() == 1));
    }

    #[test]
    fn parses_ps_row_and_redacts_command() {
        let details =
            parse_process_details("  4242     1 alice   01:02:03 psql password=hunter2 -h db")
                .expect("details");
        assert_eq!(details.pid, "4242");
        assert_eq!(details.ppid, "1");
        assert_eq!(details.user, "alice");
        assert_eq!(details.elapsed, "01:02:03");
        assert_eq!(details.command, "psql password=[REDACTED] -h db");

        assert!(parse_process_details("").is_none());
        assert!(parse_process_details("1 2 3").is_none());
    }

    #[test]
    fn split_fields_keeps_remainder() {
        assert_eq!(split_fields("a  b c d", 2), ["a", "b c d"]);
        assert_eq!(split_fields(" a b ", 4), ["a", "b"]);
        assert!(split_fields("   ", 3).is_empty());
    }
}
