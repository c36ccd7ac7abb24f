use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_twopfx").to_string()
}

/// Three 4x3 RGB24 frames, back to back.
fn raw_frames() -> Vec<u8> {
    let mut out = Vec::new();
    for f in 0..3u8 {
        for i in 0..4 * 3 * 3u8 {
            out.push(i.wrapping_mul(37).wrapping_add(f * 5));
        }
    }
    out
}

#[test]
fn cli_encode_decode_roundtrip() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgb");
    let container = dir.path().join("seq.2pfx");
    let output = dir.path().join("out.rgb");
    std::fs::write(&input, raw_frames()).unwrap();

    let st = Command::new(bin())
        .args(["encode", "--width", "4", "--height", "3"])
        .arg(&input)
        .arg(&container)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(&std::fs::read(&container).unwrap()[..4], b"2PFX");

    let st = Command::new(bin())
        .arg("decode")
        .arg(&container)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), raw_frames());
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgb");
    let container = dir.path().join("seq.2pfx");
    std::fs::write(&input, raw_frames()).unwrap();
    std::fs::write(&container, b"keep me").unwrap();

    let encode = |force: bool| {
        let mut cmd = Command::new(bin());
        if force {
            cmd.arg("--force");
        }
        cmd.args(["encode", "--width", "4", "--height", "3"])
            .arg(&input)
            .arg(&container)
            .status()
            .unwrap()
    };

    assert!(!encode(false).success());
    assert_eq!(std::fs::read(&container).unwrap(), b"keep me");
    assert!(encode(true).success());
    assert_eq!(&std::fs::read(&container).unwrap()[..4], b"2PFX");
}

#[test]
fn cli_rejects_partial_frames() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgb");
    let container = dir.path().join("seq.2pfx");
    let mut raw = raw_frames();
    raw.pop();
    std::fs::write(&input, raw).unwrap();

    let out = Command::new(bin())
        .args(["encode", "--width", "4", "--height", "3"])
        .arg(&input)
        .arg(&container)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(!out.stderr.is_empty());
}

#[test]
fn cli_failed_encode_leaves_no_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.rgb");
    let container = dir.path().join("seq.2pfx");
    std::fs::write(&input, b"").unwrap();

    let encode = || {
        Command::new(bin())
            .args(["encode", "--width", "4", "--height", "3"])
            .arg(&input)
            .arg(&container)
            .output()
            .unwrap()
    };

    // A rerun reports the same input error, not an existing output file.
    for _ in 0..2 {
        let out = encode();
        assert!(!out.status.success());
        assert!(!container.exists());
        assert!(String::from_utf8_lossy(&out.stderr).contains("no frames"));
    }
}

#[test]
fn cli_decode_rejects_corrupt_container() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("bad.2pfx");
    let output = dir.path().join("out.rgb");
    std::fs::write(&container, b"2PFX\x01\0\0\0").unwrap();

    let out = Command::new(bin())
        .arg("decode")
        .arg(&container)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("truncated"));
    assert!(!output.exists());
}

#[test]
fn cli_info_json() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.rgb");
    let container = dir.path().join("seq.2pfx");
    std::fs::write(&input, raw_frames()).unwrap();

    let st = Command::new(bin())
        .args(["encode", "--width", "4", "--height", "3"])
        .arg(&input)
        .arg(&container)
        .status()
        .unwrap();
    assert!(st.success());

    let out = Command::new(bin())
        .args(["--json", "info"])
        .arg(&container)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["frames"], 3);
    assert_eq!(json["width"], 4);
    assert_eq!(json["height"], 3);
    assert_eq!(json["raw_size"], 3 * 4 * 3 * 3);
    assert_eq!(json["records"].as_array().unwrap().len(), 3);
    assert_eq!(
        json["container_size"],
        std::fs::metadata(&container).unwrap().len()
    );
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("magic=2PFX"));
}
