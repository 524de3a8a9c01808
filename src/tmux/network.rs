//! Listening TCP sockets and SSH sessions on the host.

use tracing::instrument;

use super::{
    collector::split_fields, command, redact::mask_sensitive_text, ListeningServer, NetworkState,
    SshConnection, SshTunnel,
};

const TUNNEL_FLAGS: [&str; 4] = [" -L ", " -R ", " -D ", " -W "];

#[instrument]
pub async fn collect() -> NetworkState {
    let lsof = command::capture("lsof", &["-nP", "-iTCP", "-sTCP:LISTEN"]).await;
    let ps = command::capture("ps", &["-axo", "pid=,ppid=,user=,command="]).await;

    let (ssh_connections, ssh_tunnels) = parse_ssh_processes(&ps);
    NetworkState {
        listening_servers: parse_listening(&lsof),
        ssh_connections,
        ssh_tunnels,
    }
}

/// Rows of `lsof -nP -iTCP -sTCP:LISTEN`, header skipped.
#[must_use]
pub fn parse_listening(output: &str) -> Vec<ListeningServer> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 9 {
                return None;
            }
            Some(ListeningServer {
                command: parts[0].to_string(),
                pid: parts[1].to_string(),
                user: parts[2].to_string(),
                address: parts[8].to_string(),
            })
        })
        .collect()
}

/// SSH processes from `ps -axo pid=,ppid=,user=,command=`; forwarding
/// sessions are reported again as tunnels.
#[must_use]
pub fn parse_ssh_processes(output: &str) -> (Vec<SshConnection>, Vec<SshTunnel>) {
    let mut connections = Vec::new();
    let mut tunnels = Vec::new();

    for line in output.lines() {
        let Ok([pid, ppid, user, command]) = <[&str; 4]>::try_from(split_fields(line, 4)) else {
            continue;
        };
        if !command.contains("ssh") {
            continue;
        }

        let masked = mask_sensitive_text(command);
        if TUNNEL_FLAGS.iter().any(|flag| command.contains(flag)) {
            tunnels.push(SshTunnel {
                pid: pid.to_string(),
                user: user.to_string(),
                command: masked.clone(),
                kind: "tunnel".to_string(),
            });
        }
        connections.push(SshConnection {
            pid: pid.to_string(),
            ppid: ppid.to_string(),
            user: user.to_string(),
            command: masked,
        });
    }

    (connections, tunnels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lsof_listeners() {
        let output = "COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME\n\
                      python3  4242 alice  5u  IPv4 0x1234      0t0  TCP 127.0.0.1:5001 (LISTEN)\n\
                      short line";
        let servers = parse_listening(output);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].command, "python3");
        assert_eq!(servers[0].pid, "4242");
        assert_eq!(servers[0].user, "alice");
        assert_eq!(servers[0].address, "127.0.0.1:5001");
    }

    #[test]
    fn classifies_ssh_tunnels() {
        let output = "  10     1 root /usr/sbin/sshd -D\n\
                      200   150 alice ssh -L 8080:localhost:80 bastion\n\
                      300   150 alice ssh host\n\
                      400   150 alice vim notes.txt";
        let (connections, tunnels) = parse_ssh_processes(output);

        assert_eq!(connections.len(), 3);
        assert_eq!(connections[1].ppid, "150");
        let tunnel_pids: Vec<&str> = tunnels.iter().map(|t| t.pid.as_str()).collect();
        assert_eq!(tunnel_pids, ["200"]);
        assert_eq!(tunnels[0].kind, "tunnel");
    }

    #[test]
    fn ssh_commands_are_redacted() {
        let (connections, _) = parse_ssh_processes("1 1 bob sshpass password=hunter2 ssh host");
        assert_eq!(connections[0].command, "sshpass password=[REDACTED] ssh host");
    }
}
