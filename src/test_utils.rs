use std::{io::BufRead, path::{Path, PathBuf}};

use anyhow::bail;
use itertools::Itertools;
use serde::{de::{Error, Visitor}, Deserialize};

#[derive(Debug, Clone)]
pub enum TestOutput {
    /// The printed representation of the last value on the line.
    Printed(String),
    /// Nothing is printed: the line evaluates to undefined.
    Unprinted,
}

/// The expected outcome of one line: its output, or the class name of the
/// error it raises.
#[derive(Debug, Clone)]
pub struct TestEvaluationResult(Result<TestOutput, String>);

impl From<TestEvaluationResult> for Result<TestOutput, String> {
    fn from(value: TestEvaluationResult) -> Self {
        value.0
    }
}

struct TestEvaluationResultVisitor {}

impl<'de> Deserialize<'de> for TestEvaluationResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de> {

        deserializer.deserialize_map(TestEvaluationResultVisitor {})
    }
}

impl<'de> Visitor<'de> for TestEvaluationResultVisitor {
    type Value = TestEvaluationResult;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "A structure containing the boolean key 'ok'. If it's okay, contains the key 'output', otherwise the key 'type'")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>, {

        if map.next_key::<String>()? != Some("ok".to_owned()) {
            return Err(A::Error::custom("First key should be 'ok'"))
        }

        let ok: bool = map.next_value()?;
        let second_key = map.next_key::<String>()?
            .ok_or(A::Error::custom("Must have two keys"))?;

        let result = if ok {
            if second_key != "output" {
                return Err(A::Error::custom("Second key of an ok result should be 'output'"))
            }
            let output: Option<String> = map.next_value()?;
            TestEvaluationResult(Ok(output.map_or(TestOutput::Unprinted, TestOutput::Printed)))
        } else {
            if second_key != "type" {
                return Err(A::Error::custom("Second key of an error result should be 'type'"))
            }
            TestEvaluationResult(Err(map.next_value::<String>()?))
        };

        if map.next_key::<String>()?.is_some() {
            return Err(A::Error::custom("Only two keys should be present"));
        }

        Ok(result)
    }
}

fn load_input_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<String>> {
    let source = std::fs::read(path)?;
    Ok(source.lines().collect::<Result<Vec<String>, _>>()?)
}

fn load_output_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<TestEvaluationResult>> {
    let source = std::fs::read(path)?;
    let result: Vec<TestEvaluationResult> = serde_json::from_slice(&source)?;
    Ok(result)
}

pub fn load_test_pair(testcase: usize) -> anyhow::Result<Vec<(String, TestEvaluationResult)>> {
    if !all_testcases().any(|known| known == testcase) { bail!("Testcase out of bounds"); }

    let base_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let input = load_input_file(base_path.join("test_inputs").join(format!("{}.scm", testcase)))?;
    let output = load_output_file(base_path.join("test_outputs").join(format!("{}.json", testcase)))?;

    if input.len() != output.len() { bail!("Input and output of testcase {} do not match", testcase); }
    Ok(input.into_iter().zip(output).collect_vec())
}

pub fn all_testcases() -> impl Iterator<Item = usize> {
    1..=8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expected_outcomes() -> anyhow::Result<()> {
        let results: Vec<TestEvaluationResult> = serde_json::from_str(
            r#"[{"ok": true, "output": "3"}, {"ok": true, "output": null}, {"ok": false, "type": "ArityError"}]"#,
        )?;
        let results = results.into_iter().map(Result::<TestOutput, String>::from).collect_vec();

        assert!(matches!(&results[0], Ok(TestOutput::Printed(printed)) if printed == "3"));
        assert!(matches!(&results[1], Ok(TestOutput::Unprinted)));
        assert!(matches!(&results[2], Err(class) if class == "ArityError"));
        Ok(())
    }

    #[test]
    fn rejects_misnamed_keys() {
        let result = serde_json::from_str::<TestEvaluationResult>(r#"{"ok": true, "type": "x"}"#);
        assert!(result.is_err());
    }
}
