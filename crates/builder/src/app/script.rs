use std::fmt;

use placement::{InputEvent, Key, ObjectId, Vec3};

/// One line of a builder script, already validated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScriptCommand {
    Event(InputEvent),
    SelectPrefab { name: String },
    Shift { id: ObjectId, dx: i32, dy: i32 },
    Tick { count: u32 },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: &'static str,
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. usage: {}", self.reason, self.usage)
    }
}

impl std::error::Error for CommandParseError {}

/// Parses one script line. Blank lines and `#` comments yield `Ok(None)`.
pub(crate) fn parse_script_line(line: &str) -> Result<Option<ScriptCommand>, CommandParseError> {
    let content = match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    };
    let tokens = content.split_whitespace().collect::<Vec<_>>();
    let Some((&name, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "move" => parse_move(args)?,
        "key" => parse_key(args)?,
        "press" => parse_press(args)?,
        "release" => {
            require_no_args(args, "release")?;
            ScriptCommand::Event(InputEvent::PointerPrimaryReleased)
        }
        "place" => {
            require_no_args(args, "place")?;
            ScriptCommand::Event(InputEvent::PointerSecondaryPressed)
        }
        "scroll" => parse_scroll(args)?,
        "precision" => parse_precision(args)?,
        "material" => {
            require_no_args(args, "material")?;
            ScriptCommand::Event(InputEvent::MaterialButtonPressed)
        }
        "spawn" => parse_spawn(args)?,
        "shift" => parse_shift(args)?,
        "tick" => parse_tick(args)?,
        "status" => {
            require_no_args(args, "status")?;
            ScriptCommand::Status
        }
        _ => {
            return Err(CommandParseError {
                reason: format!("unknown command '{name}'"),
                usage: "move|key|press|release|place|scroll|precision|material|spawn|shift|tick|status",
            })
        }
    };
    Ok(Some(command))
}

fn parse_move(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "move <x> <y> <z>";
    let [x, y, z] = args else {
        return Err(CommandParseError {
            reason: "expected exactly three coordinates".to_string(),
            usage: USAGE,
        });
    };
    let position = Vec3::new(
        parse_f32(x, "x", USAGE)?,
        parse_f32(y, "y", USAGE)?,
        parse_f32(z, "z", USAGE)?,
    );
    if !position.is_finite() {
        return Err(CommandParseError {
            reason: "coordinates must be finite".to_string(),
            usage: USAGE,
        });
    }
    Ok(ScriptCommand::Event(InputEvent::PointerMoved(position)))
}

fn parse_key(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "key <1|2|3|save|load|esc>";
    let [token] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one key".to_string(),
            usage: USAGE,
        });
    };
    let key = Key::from_token(token).ok_or_else(|| CommandParseError {
        reason: format!("unknown key '{token}'"),
        usage: USAGE,
    })?;
    Ok(ScriptCommand::Event(InputEvent::KeyPressed(key)))
}

fn parse_press(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "press [object_id]";
    let target = match args {
        [] => None,
        [id] => Some(parse_object_id(id, USAGE)?),
        _ => {
            return Err(CommandParseError {
                reason: "expected at most one object id".to_string(),
                usage: USAGE,
            })
        }
    };
    Ok(ScriptCommand::Event(InputEvent::PointerPrimaryPressed {
        target,
    }))
}

fn parse_scroll(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "scroll <delta>";
    let [delta] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one scroll delta".to_string(),
            usage: USAGE,
        });
    };
    let delta = parse_f32(delta, "delta", USAGE)?;
    Ok(ScriptCommand::Event(InputEvent::PointerScroll(delta)))
}

fn parse_precision(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "precision <on|off>";
    let enabled = match args {
        ["on"] => true,
        ["off"] => false,
        _ => {
            return Err(CommandParseError {
                reason: "expected 'on' or 'off'".to_string(),
                usage: USAGE,
            })
        }
    };
    Ok(ScriptCommand::Event(InputEvent::ModifierChanged(enabled)))
}

fn parse_spawn(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    let [name] = args else {
        return Err(CommandParseError {
            reason: "expected exactly one prefab name".to_string(),
            usage: "spawn <prefab_name>",
        });
    };
    Ok(ScriptCommand::SelectPrefab {
        name: (*name).to_string(),
    })
}

fn parse_shift(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "shift <object_id> <dx> <dy>";
    let [id, dx, dy] = args else {
        return Err(CommandParseError {
            reason: "expected an object id and two cell offsets".to_string(),
            usage: USAGE,
        });
    };
    Ok(ScriptCommand::Shift {
        id: parse_object_id(id, USAGE)?,
        dx: parse_i32(dx, "dx", USAGE)?,
        dy: parse_i32(dy, "dy", USAGE)?,
    })
}

fn parse_tick(args: &[&str]) -> Result<ScriptCommand, CommandParseError> {
    const USAGE: &str = "tick [count]";
    let count = match args {
        [] => 1,
        [raw] => raw.parse::<u32>().map_err(|_| CommandParseError {
            reason: format!("invalid tick count '{raw}' (expected u32)"),
            usage: USAGE,
        })?,
        _ => {
            return Err(CommandParseError {
                reason: "expected at most one tick count".to_string(),
                usage: USAGE,
            })
        }
    };
    Ok(ScriptCommand::Tick { count })
}

fn parse_object_id(raw: &str, usage: &'static str) -> Result<ObjectId, CommandParseError> {
    raw.parse::<u64>()
        .map(ObjectId)
        .map_err(|_| CommandParseError {
            reason: format!("invalid object id '{raw}' (expected u64)"),
            usage,
        })
}

fn parse_f32(raw: &str, field: &str, usage: &'static str) -> Result<f32, CommandParseError> {
    raw.parse::<f32>().map_err(|_| CommandParseError {
        reason: format!("invalid {field} '{raw}' (expected f32)"),
        usage,
    })
}

fn parse_i32(raw: &str, field: &str, usage: &'static str) -> Result<i32, CommandParseError> {
    raw.parse::<i32>().map_err(|_| CommandParseError {
        reason: format!("invalid {field} '{raw}' (expected i32)"),
        usage,
    })
}

fn require_no_args(args: &[&str], usage: &'static str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError {
            reason: "unexpected extra arguments".to_string(),
            usage,
        })
    }
}
