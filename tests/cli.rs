use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn counts_primes_below_1000() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("1000").arg("--quiet");
    cmd.assert().success().stdout(predicate::str::diff("168\n"));
    Ok(())
}

#[test]
fn counts_a_window() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("1010").arg("--start").arg("990").arg("--quiet");
    cmd.assert().success().stdout(predicate::str::diff("3\n"));
    Ok(())
}

#[test]
fn accepts_scientific_notation() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("1e6").arg("--quiet");
    cmd.assert().success().stdout(predicate::str::diff("78498\n"));
    Ok(())
}

#[test]
fn json_summary_carries_the_count() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("1000").arg("--json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 168"))
        .stdout(predicate::str::contains("\"stop\": 1000"));
    Ok(())
}

#[test]
fn prints_primes_one_per_line() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("100").arg("--print");
    let output = cmd.assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone())?;
    let primes: Vec<&str> = stdout.lines().collect();
    assert_eq!(primes.len(), 25);
    assert_eq!(primes.first(), Some(&"2"));
    assert_eq!(primes.last(), Some(&"97"));
    Ok(())
}

#[test]
fn finds_the_nth_prime() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("0").arg("--nth").arg("25");
    cmd.assert().success().stdout(predicate::str::diff("97\n"));
    Ok(())
}

#[test]
fn rejects_invalid_segment_size() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("1000").arg("--segment-size-kb").arg("100");
    cmd.assert().failure().stderr(predicate::str::contains("segment-size-kb"));
    Ok(())
}

#[test]
fn rejects_inverted_interval() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("10").arg("--start").arg("100");
    cmd.assert().failure().stderr(predicate::str::contains("start"));
    Ok(())
}

#[test]
fn rejects_garbage_numbers() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(assert_cmd::pkg_name!())?;
    cmd.arg("ten");
    cmd.assert().failure();
    Ok(())
}
