use std::process::Command;

#[test]
fn duel_binary_smoke() {
    let output = Command::new(env!("CARGO_BIN_EXE_naval-duel"))
        .args(["duel", "--seed1", "1", "--seed2", "2", "--rule", "chain_attacks"])
        .env("NAVAL_DUEL_LOG", "off")
        .output()
        .expect("failed to run naval-duel binary");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("non utf8 output");
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).expect("invalid json");
    assert!(v["winner"].is_string());
    assert_eq!(v["reason"], "Elimination");
    assert_eq!(v["rule"], "chain_attacks");
    assert_eq!(v["records"], 2);
    assert_ne!(v["alpha"]["victory"], v["bravo"]["victory"]);
}

#[test]
fn unknown_rule_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_naval-duel"))
        .args(["duel", "--rule", "salvo"])
        .output()
        .expect("failed to run naval-duel binary");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown rule"));
}
