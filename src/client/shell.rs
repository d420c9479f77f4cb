//! Interactive shell
//!
//! Reads one command per line and runs it on an `FtpSession`.

use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::client::FtpSession;
use crate::error::{ControlError, FtpClientError, report_error};
use crate::protocol::Reply;
use crate::transfer::{TransferMode, TransferReport};

/// A parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List(Option<String>),
    Get { remote: String, local: Option<String> },
    Put { local: String, remote: Option<String> },
    Delete(String),
    Mode(TransferMode),
    MakeDir(String),
    RemoveDir(String),
    ChangeDir(String),
    ChangeDirUp,
    Site(String),
    Quit,
}

/// Parses one input line. Blank lines give `Ok(None)`; the error is a usage
/// message for the user.
pub fn parse_input(line: &str) -> Result<Option<ShellCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<String> = words.map(str::to_string).collect();
    let mut args = args.into_iter();

    let command = match verb.to_ascii_lowercase().as_str() {
        "ls" | "dir" => ShellCommand::List(args.next()),
        "get" | "recv" => ShellCommand::Get {
            remote: args.next().ok_or("usage: get <remote> [local]")?,
            local: args.next(),
        },
        "put" | "send" => ShellCommand::Put {
            local: args.next().ok_or("usage: put <local> [remote]")?,
            remote: args.next(),
        },
        "delete" => ShellCommand::Delete(args.next().ok_or("usage: delete <name>")?),
        "mode" => match args.next().as_deref() {
            Some("a") | Some("active") => ShellCommand::Mode(TransferMode::Active),
            Some("p") | Some("passive") => ShellCommand::Mode(TransferMode::Passive),
            _ => return Err("usage: mode a|p".into()),
        },
        "mkdir" => ShellCommand::MakeDir(args.next().ok_or("usage: mkdir <name>")?),
        "rmdir" => ShellCommand::RemoveDir(args.next().ok_or("usage: rmdir <name>")?),
        "cd" => ShellCommand::ChangeDir(args.next().ok_or("usage: cd <name>")?),
        "cdup" => ShellCommand::ChangeDirUp,
        "site" => {
            let rest: Vec<String> = args.collect();
            if rest.is_empty() {
                return Err("usage: site <arguments>".into());
            }
            return Ok(Some(ShellCommand::Site(rest.join(" "))));
        }
        "quit" | "bye" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Runs a parsed command and returns what to print.
pub async fn execute(session: &mut FtpSession, command: ShellCommand) -> Result<String, FtpClientError> {
    match command {
        ShellCommand::List(target) => {
            let report = session.list(target).await?;
            Ok(report.listing.clone().unwrap_or_default() + &describe(&report))
        }
        ShellCommand::Get { remote, local } => {
            let report = session.download(&remote, local).await?;
            Ok(describe(&report))
        }
        ShellCommand::Put { local, remote } => {
            let report = session.upload(&local, remote).await?;
            Ok(describe(&report))
        }
        ShellCommand::Delete(name) => session.delete(&name).await.map(show),
        ShellCommand::Mode(mode) => {
            session.set_mode(mode);
            Ok(format!("Transfer mode: {}", mode))
        }
        ShellCommand::MakeDir(name) => session.make_dir(&name).await.map(show),
        ShellCommand::RemoveDir(name) => session.remove_dir(&name).await.map(show),
        ShellCommand::ChangeDir(name) => session.change_dir(&name).await.map(show),
        ShellCommand::ChangeDirUp => session.change_dir_up().await.map(show),
        ShellCommand::Site(args) => session.site(&args).await.map(show),
        ShellCommand::Quit => Ok(session.quit().await.map(show).unwrap_or_default()),
    }
}

fn show(reply: Reply) -> String {
    reply.to_string()
}

fn describe(report: &TransferReport) -> String {
    match &report.completion {
        Some(reply) if !report.stalled => format!("{} ({} bytes)", reply, report.bytes),
        _ => format!("{} bytes transferred, completion unconfirmed", report.bytes),
    }
}

/// Reads commands from `input` until `quit`, end of input or loss of the
/// control connection, then quits the session.
pub async fn run_shell<R>(session: &mut FtpSession, input: R) -> Result<(), FtpClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.map_err(ControlError::Io)? {
        let command = match parse_input(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };
        let quitting = command == ShellCommand::Quit;

        match execute(session, command).await {
            Ok(output) if !output.is_empty() => println!("{}", output),
            Ok(_) => {}
            Err(e) => report_error(&e),
        }

        if quitting {
            return Ok(());
        }
        if !session.is_connected() {
            println!("Connection closed by server");
            return Ok(());
        }
    }

    debug!("End of input");
    session.quit().await;
    Ok(())
}
