use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

const CONFIG: &str = r#"{
    "topology": {
        "nodes": [
            {"id": 0, "role": "receiver"},
            {"id": 1, "cache_size": 1},
            {"id": 2, "contents": [{"from": 1, "to": 3}]}
        ],
        "edges": [{"u": 0, "v": 1}, {"u": 1, "v": 2}]
    },
    "strategy": {"name": "LCE"}
}"#;

fn scratch_dir(name: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dir = std::env::temp_dir().join(format!("icnsim-cli-{}-{name}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn run(name: &str, trace: &str) -> Result<Output, Box<dyn Error>> {
    let dir = scratch_dir(name)?;
    fs::write(dir.join("config.json"), CONFIG)?;
    fs::write(dir.join("trace.txt"), trace)?;
    let output = Command::new(env!("CARGO_BIN_EXE_icnsim"))
        .arg(dir.join("config.json"))
        .arg(dir.join("trace.txt"))
        .arg("-d")
        .output()?;
    fs::remove_dir_all(&dir)?;
    Ok(output)
}

/// The summary is printed first, the debug report follows it
fn summary(output: &Output) -> Result<Value, Box<dyn Error>> {
    let stdout = String::from_utf8(output.stdout.clone())?;
    let first = serde_json::Deserializer::from_str(&stdout).into_iter::<Value>().next();
    Ok(first.ok_or("no summary on stdout")??)
}

#[test]
fn replays_a_trace_with_the_debug_report() -> Result<(), Box<dyn Error>> {
    let output = run("debug", "0 0 1\n1 0 1\n")?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary = summary(&output)?;
    assert_eq!(summary["requests"], 2);
    assert_eq!(summary["cache_hits"], 1);
    assert_eq!(summary["server_hits"], 1);

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Strategy: LCE"));
    assert!(stdout.contains("Requests processed (warm-up included): 2"));
    assert!(stdout.contains("Cached contents by node: (1: 1)"));
    Ok(())
}

#[test]
fn an_empty_trace_gives_an_empty_summary() -> Result<(), Box<dyn Error>> {
    let output = run("empty", "")?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(summary(&output)?["requests"], 0);
    Ok(())
}
