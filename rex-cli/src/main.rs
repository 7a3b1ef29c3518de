use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use clap::Parser;
use rex_core::{
    SymbolTable, Type, Value, compile_annotations, compile_expression, compile_export_args,
    parse_annotation_types, parse_type,
};

/// Evaluate REX record expressions over TSV rows.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(
        long,
        value_name = "FIELDS",
        default_value = "",
        help = "Record schema as 'name: Type, ...' (declaration order is column order)"
    )]
    schema: String,

    #[arg(short, long, value_name = "TEXT", help = "Expression text to compile")]
    expr: String,

    #[arg(
        long,
        value_name = "MODE",
        default_value = "eval",
        help = "Entry point: eval, export, annotate, type"
    )]
    mode: String,

    #[arg(
        long,
        value_name = "TYPE",
        help = "Expected result type (eval mode only)"
    )]
    expect: Option<String>,

    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "TSV input file (defaults to stdin)"
    )]
    input: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let fields = parse_annotation_types(&cli.schema)?;
    let symbols = SymbolTable::from_fields(&fields);

    // Type mode resolves the expression statically and reads no rows.
    if cli.mode == "type" {
        let compiled = compile_expression(&symbols, &cli.expr, None)?;
        println!("{}", compiled.ty());
        return Ok(());
    }

    let rows = read_rows(cli.input.as_deref(), &fields)?;

    match cli.mode.as_str() {
        "eval" => {
            let expected = cli.expect.as_deref().map(parse_type).transpose()?;
            let compiled = compile_expression(&symbols, &cli.expr, expected.as_ref())?;
            for env in &rows {
                println!("{}", compiled.eval(env));
            }
        }
        "export" => {
            let plan = compile_export_args(&symbols, &cli.expr)?;
            if let Some(header) = &plan.header {
                println!("{header}");
            }
            for env in &rows {
                let cells: Vec<String> = plan
                    .columns
                    .iter()
                    .map(|column| column.eval(env).to_string())
                    .collect();
                println!("{}", cells.join("\t"));
            }
        }
        "annotate" => {
            let annotations = compile_annotations(&symbols, &cli.expr)?;
            for env in &rows {
                let cells: Vec<String> = annotations
                    .iter()
                    .map(|a| format!("{}={}", a.path.join("."), a.expr.eval(env)))
                    .collect();
                println!("{}", cells.join("\t"));
            }
        }
        other => bail!("unsupported mode: {other}"),
    }

    Ok(())
}

/// Read TSV rows and parse each cell into the environment array per the
/// schema column types.
fn read_rows(input: Option<&str>, fields: &[(String, Type)]) -> Result<Vec<Vec<Value>>> {
    let text = match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read input file {path}"))?
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.len() != fields.len() {
            bail!(
                "line {}: expected {} columns but found {}",
                lineno + 1,
                fields.len(),
                cells.len()
            );
        }
        let mut env = Vec::with_capacity(fields.len());
        for (cell, (name, ty)) in cells.iter().zip(fields) {
            let value = parse_cell(cell, ty)
                .with_context(|| format!("line {}: column '{name}'", lineno + 1))?;
            env.push(value);
        }
        rows.push(env);
    }
    Ok(rows)
}

/// Parse one TSV cell into a runtime value of the given schema type.
///
/// Only String and Empty columns admit an empty cell; the compiled
/// closures have no missing-value representation for the other types, so
/// an empty cell there is a row error. Arrays are comma-separated element
/// lists; the opaque domain types have no text form and are rejected
/// here.
fn parse_cell(cell: &str, ty: &Type) -> Result<Value> {
    if cell.is_empty() && !matches!(ty, Type::String | Type::Empty) {
        bail!("empty cell is not a valid {ty}");
    }
    let value = match ty {
        Type::Empty => Value::Empty,
        Type::Boolean => Value::Boolean(cell.parse().context("expected true or false")?),
        Type::Char => {
            let mut chars = cell.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => bail!("expected a single character"),
            }
        }
        Type::Int => Value::Int(cell.parse().context("expected an Int")?),
        Type::Long => Value::Long(cell.parse().context("expected a Long")?),
        Type::Float => Value::Float(cell.parse().context("expected a Float")?),
        Type::Double => Value::Double(cell.parse().context("expected a Double")?),
        Type::String => Value::String(cell.to_string()),
        Type::Array(elem) => {
            let mut items = Vec::new();
            for item in cell.split(',') {
                items.push(parse_cell(item, elem)?);
            }
            Value::Array(items)
        }
        other => bail!("type {other} has no TSV text form"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn evaluates_expression_over_tsv_rows() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t100\nchr2\t250\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("pos * 2")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .success()
            .stdout("200\n500\n");
    }

    #[test]
    fn filters_rows_with_wildcard_match() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t100\nalt7\t250\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("chrom ~ \"chr*\" && pos < 200")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .success()
            .stdout("true\nfalse\n");
    }

    #[test]
    fn export_mode_prints_tab_joined_header() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t100\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("name=chrom, doubled=pos * 2")
            .arg("--mode")
            .arg("export")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .success()
            .stdout("name\tdoubled\nchr1\t200\n");
    }

    #[test]
    fn positional_export_omits_header() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t100\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("chrom, pos")
            .arg("--mode")
            .arg("export")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .success()
            .stdout("chr1\t100\n");
    }

    #[test]
    fn annotate_mode_prints_path_value_pairs() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t100\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("info.depth = pos * 2")
            .arg("--mode")
            .arg("annotate")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .success()
            .stdout("info.depth=200\n");
    }

    #[test]
    fn type_mode_prints_resolved_type_without_rows() {
        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("pos: Int")
            .arg("--expr")
            .arg("pos * 2.0")
            .arg("--mode")
            .arg("type")
            .assert()
            .success()
            .stdout("Double\n");
    }

    #[test]
    fn syntax_errors_render_the_caret_line() {
        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("pos: Int")
            .arg("--expr")
            .arg("1 + + 2")
            .arg("--mode")
            .arg("type")
            .assert()
            .failure()
            .stderr(predicate::str::contains("<input>:1:1 + + 2"))
            .stderr(predicate::str::contains("^"));
    }

    #[test]
    fn expected_type_mismatch_fails() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "100\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("pos: Int")
            .arg("--expr")
            .arg("pos + 1")
            .arg("--expect")
            .arg("Boolean")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "expected result type Boolean but expression has type Int",
            ));
    }

    #[test]
    fn parses_tsv_cells() {
        assert_eq!(parse_cell("7", &Type::Int).expect("int"), Value::Int(7));
        assert_eq!(
            parse_cell("1,2", &Type::Array(Box::new(Type::Int))).expect("array"),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            parse_cell("", &Type::String).expect("empty string"),
            Value::String("".into())
        );
        assert!(parse_cell("x", &Type::Int).is_err());
    }

    #[test]
    fn rejects_empty_cell_for_non_string_columns() {
        let err = parse_cell("", &Type::Int).unwrap_err();
        assert_eq!(err.to_string(), "empty cell is not a valid Int");
        assert!(parse_cell("", &Type::Double).is_err());
        assert!(parse_cell("", &Type::Array(Box::new(Type::Int))).is_err());
    }

    #[test]
    fn empty_numeric_cell_is_a_row_error() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("rows.tsv");
        fs::write(&input_path, "chr1\t\n").expect("write input");

        Command::cargo_bin("rex-cli")
            .expect("binary exists")
            .arg("--schema")
            .arg("chrom: String, pos: Int")
            .arg("--expr")
            .arg("pos * 2")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("line 1: column 'pos'"))
            .stderr(predicate::str::contains("empty cell is not a valid Int"));
    }
}
