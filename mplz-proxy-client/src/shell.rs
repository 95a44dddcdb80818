use mplz_proxy_core::{AnalyzeRequest, LoadRequest, ProxyCommand};
use mplz_proxy_runner::GameProxy;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One parsed line of shell input
#[derive(Debug, PartialEq, Eq)]
pub enum ShellLine {
    Exit,
    Empty,
    Command(ProxyCommand),
    Unknown,
}

pub fn parse_line(line: &str) -> ShellLine {
    let args: Vec<&str> = line.split_whitespace().collect();

    match args[..] {
        [] => ShellLine::Empty,
        ["exit" | "q"] => ShellLine::Exit,
        ["load" | "r", file_name] => ShellLine::Command(ProxyCommand::Load(LoadRequest::new(file_name))),
        ["analyze" | "a", file_name, iteration, simulation_turn] => {
            match (iteration.parse::<u32>(), simulation_turn.parse::<u32>()) {
                (Ok(iteration), Ok(simulation_turn)) => ShellLine::Command(ProxyCommand::Analyze(
                    AnalyzeRequest::new(file_name, iteration, simulation_turn),
                )),
                _ => ShellLine::Unknown,
            }
        }
        _ => ShellLine::Unknown,
    }
}

/// Reads commands from stdin until `exit` or end of input. Failed commands
/// are reported and the loop keeps going.
pub async fn run(proxy: &mut GameProxy) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("$ ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            ShellLine::Exit => break,
            ShellLine::Empty => {}
            ShellLine::Unknown => println!("Unknown command."),
            ShellLine::Command(command) => {
                if let Err(e) = proxy.execute(command).await {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_aliases() {
        let expected = ShellLine::Command(ProxyCommand::Load(LoadRequest::new("game.json")));
        assert_eq!(parse_line("load game.json"), expected);
        assert_eq!(parse_line("r game.json"), expected);
    }

    #[test]
    fn test_parse_analyze() {
        assert_eq!(
            parse_line("a out.csv 100 50"),
            ShellLine::Command(ProxyCommand::Analyze(AnalyzeRequest::new("out.csv", 100, 50)))
        );
    }

    #[test]
    fn test_parse_analyze_with_bad_numbers() {
        assert_eq!(parse_line("analyze out.csv ten 50"), ShellLine::Unknown);
        assert_eq!(parse_line("analyze out.csv -1 50"), ShellLine::Unknown);
    }

    #[test]
    fn test_parse_exit_and_blank() {
        assert_eq!(parse_line("exit"), ShellLine::Exit);
        assert_eq!(parse_line("q"), ShellLine::Exit);
        assert_eq!(parse_line("   "), ShellLine::Empty);
    }

    #[test]
    fn test_parse_wrong_arity() {
        assert_eq!(parse_line("load"), ShellLine::Unknown);
        assert_eq!(parse_line("analyze out.csv 1"), ShellLine::Unknown);
        assert_eq!(parse_line("step 10"), ShellLine::Unknown);
    }
}
