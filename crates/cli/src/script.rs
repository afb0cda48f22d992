//! Line-oriented edit scripts.
//!
//! One instruction per line, times in seconds:
//!
//! ```text
//! create 10 15 Intro      # chapter growing from 10s, up to 15s long
//! click 42.5              # split here / fill gap
//! resize 2 start 24
//! drag 2 end
//! move 30
//! release
//! rename 2 Main part
//! play-gap 27
//! pos 30.02
//! wait 1200               # milliseconds
//! ```

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chapter_engine::time::seconds_to_tl;
use chapter_engine::{Command, DragTarget, Edge};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    Engine(Command),
    Wait(Duration),
    Quit,
}

/// Parses one script line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine>> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb {
        "create" => Command::CreateInGap {
            at_tl: seconds(arg(&rest, 0, "at")?)?,
            length_tl: seconds(arg(&rest, 1, "length")?)?,
            label: label(&rest[2.min(rest.len())..]),
        },
        "click" => Command::Click {
            at_tl: seconds(arg(&rest, 0, "at")?)?,
        },
        "split" => Command::Split {
            segment_id: number(arg(&rest, 0, "segment id")?)?,
            at_tl: seconds(arg(&rest, 1, "at")?)?,
        },
        "resize" => Command::ResizeEdge {
            segment_id: number(arg(&rest, 0, "segment id")?)?,
            edge: edge(arg(&rest, 1, "edge")?)?,
            to_tl: seconds(arg(&rest, 2, "to")?)?,
        },
        "drag" => {
            let target = match arg(&rest, 0, "target")? {
                "cursor" => DragTarget::Cursor,
                id => DragTarget::Edge {
                    segment_id: number(id)?,
                    edge: edge(arg(&rest, 1, "edge")?)?,
                },
            };
            Command::BeginDrag { target }
        }
        "move" => Command::DragTo {
            t_tl: seconds(arg(&rest, 0, "to")?)?,
        },
        "release" => Command::EndDrag,
        "delete" => Command::Delete {
            segment_id: number(arg(&rest, 0, "segment id")?)?,
        },
        "rename" => Command::Rename {
            segment_id: number(arg(&rest, 0, "segment id")?)?,
            label: label(&rest[1.min(rest.len())..]).unwrap_or_default(),
        },
        "play-segment" => Command::PlaySegment {
            segment_id: number(arg(&rest, 0, "segment id")?)?,
        },
        "play-gap" => Command::PlayGap {
            at_tl: seconds(arg(&rest, 0, "at")?)?,
        },
        "play" => Command::Play,
        "through" => Command::PlayThrough,
        "pause" => Command::Pause,
        "seek" => Command::Seek {
            t_tl: seconds(arg(&rest, 0, "to")?)?,
        },
        "pos" => Command::PositionChanged {
            t_tl: seconds(arg(&rest, 0, "position")?)?,
        },
        "wait" => {
            let millis: u64 = number(arg(&rest, 0, "milliseconds")?)?;
            return Ok(Some(ScriptLine::Wait(Duration::from_millis(millis))));
        }
        "quit" => return Ok(Some(ScriptLine::Quit)),
        other => bail!("unknown instruction `{other}`"),
    };
    Ok(Some(ScriptLine::Engine(command)))
}

fn arg<'a>(rest: &[&'a str], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .copied()
        .ok_or_else(|| anyhow!("missing argument `{name}`"))
}

fn seconds(value: &str) -> Result<i64> {
    let seconds: f64 = value
        .parse()
        .with_context(|| format!("invalid seconds `{value}`"))?;
    if !seconds.is_finite() {
        bail!("invalid seconds `{value}`");
    }
    Ok(seconds_to_tl(seconds))
}

fn number<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid number `{value}`"))
}

fn edge(value: &str) -> Result<Edge> {
    match value {
        "start" => Ok(Edge::Start),
        "end" => Ok(Edge::End),
        other => bail!("edge must be `start` or `end`, got `{other}`"),
    }
}

fn label(words: &[&str]) -> Option<String> {
    (!words.is_empty()).then(|| words.join(" "))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chapter_engine::{Command, DragTarget, Edge};

    use super::{ScriptLine, parse_line};

    #[test]
    fn parses_create_with_multi_word_label() {
        let line = parse_line("create 10 15.5 Opening credits").expect("valid line");

        assert_eq!(
            line,
            Some(ScriptLine::Engine(Command::CreateInGap {
                at_tl: 10_000_000,
                length_tl: 15_500_000,
                label: Some("Opening credits".to_string()),
            }))
        );
    }

    #[test]
    fn parses_edge_and_cursor_drags() {
        assert_eq!(
            parse_line("drag 3 end").expect("valid line"),
            Some(ScriptLine::Engine(Command::BeginDrag {
                target: DragTarget::Edge {
                    segment_id: 3,
                    edge: Edge::End
                }
            }))
        );
        assert_eq!(
            parse_line("drag cursor").expect("valid line"),
            Some(ScriptLine::Engine(Command::BeginDrag {
                target: DragTarget::Cursor
            }))
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        assert_eq!(parse_line("   ").expect("blank"), None);
        assert_eq!(parse_line("# just a note").expect("comment"), None);
        assert_eq!(
            parse_line("wait 250 # settle").expect("wait"),
            Some(ScriptLine::Wait(Duration::from_millis(250)))
        );
    }

    #[test]
    fn reports_bad_input() {
        assert!(parse_line("resize 1 middle 4").is_err());
        assert!(parse_line("split 1").is_err());
        assert!(parse_line("jump 4").is_err());
        assert!(parse_line("seek inf").is_err());
    }
}
