//! CLI command implementations
//!
//! Every command builds a fresh registry from the definition file, loads
//! the data file into in-memory stores, runs, and prints one JSON object.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::predicate::Constraints;
use crate::query::{Backfill, Query};
use crate::registry::Registry;
use crate::resource::DumpStyle;

use super::args::{Command, Source};
use super::errors::{CliError, CliResult};
use super::io::{read_data, write_error, write_response};

/// Parse arguments and run the command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a parsed command, printing engine errors as JSON
pub fn run_command(command: Command) -> CliResult<()> {
    let outcome = match command {
        Command::Query {
            source,
            type_name,
            select,
            filter,
            order_by,
            limit,
            offset,
            backfill,
            dump_style,
        } => query(
            &source,
            &QueryArgs {
                type_name,
                select,
                filter,
                order_by,
                limit,
                offset,
                backfill: backfill.map(Backfill::from),
                dump_style: dump_style.into(),
            },
        ),
        Command::Generate {
            source,
            type_name,
            count,
        } => generate(&source, &type_name, count),
        Command::Validate { source } => validate(&source),
    };
    match outcome {
        Ok(data) => write_response(data),
        Err(error) => {
            write_error(error.code_str(), error.message())?;
            Err(error)
        }
    }
}

/// Build the registry from the definition and config files
pub fn load_registry(source: &Source) -> CliResult<Arc<Registry>> {
    let config = match &source.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    Ok(Registry::builder()
        .config(config)
        .define_file(&source.defs)?
        .build()?)
}

/// Create every record of the data file, one bulk create per type
fn load_data(registry: &Arc<Registry>, source: &Source) -> CliResult<()> {
    let Some(path) = &source.data else {
        return Ok(());
    };
    for (type_name, records) in read_data(path)? {
        let rtype = registry.resource_type(&type_name)?;
        let records = records.as_array().cloned().ok_or_else(|| {
            CliError::input_error(format!("records of {} must be an array", type_name))
        })?;
        let resources = records
            .into_iter()
            .map(|record| rtype.new_resource(record))
            .collect::<crate::Result<Vec<_>>>()?;
        rtype.create_many(&resources)?;
    }
    Ok(())
}

pub struct QueryArgs {
    pub type_name: String,
    pub select: Option<String>,
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub backfill: Option<Backfill>,
    pub dump_style: DumpStyle,
}

/// Run one query over the loaded data
pub fn query(source: &Source, args: &QueryArgs) -> CliResult<Value> {
    let registry = load_registry(source)?;
    load_data(&registry, source)?;
    let rtype = registry.resource_type(&args.type_name)?;

    let mut query = match &args.select {
        Some(keys) => Query::from_keys(&rtype, keys.split(',').map(str::trim))?,
        None => rtype.query(),
    };
    if let Some(filter) = &args.filter {
        query = query.where_str(filter)?;
    }
    if let Some(order_by) = &args.order_by {
        query = query.order_by_str(order_by)?;
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    if let Some(mode) = args.backfill {
        query = query.backfill(mode);
    }

    let batch = query.execute()?;
    Ok(json!({
        "query": query.to_string(),
        "count": batch.len(),
        "results": batch.dump_with(args.dump_style),
    }))
}

/// Generate `count` resources without storing them
pub fn generate(source: &Source, type_name: &str, count: usize) -> CliResult<Value> {
    let registry = load_registry(source)?;
    let rtype = registry.resource_type(type_name)?;
    let resources = rtype.generate_many(count, &Constraints::new())?;
    Ok(Value::Array(resources.iter().map(|r| r.dump()).collect()))
}

/// Validate every data record; reports errors per type instead of failing
pub fn validate(source: &Source) -> CliResult<Value> {
    let registry = load_registry(source)?;
    let path = source
        .data
        .as_ref()
        .ok_or_else(|| CliError::input_error("validate needs --data"))?;

    let mut report = Map::new();
    let mut valid = true;
    for (type_name, records) in read_data(path)? {
        let rtype = registry.resource_type(&type_name)?;
        let records = records.as_array().cloned().unwrap_or_default();
        let mut errors = Vec::new();
        for (position, record) in records.iter().enumerate() {
            let outcome = rtype
                .new_resource(record.clone())
                .and_then(|resource| resource.validate());
            if let Err(error) = outcome {
                errors.push(json!({"record": position, "error": error.to_string()}));
            }
        }
        valid &= errors.is_empty();
        report.insert(
            type_name,
            json!({"records": records.len(), "errors": errors}),
        );
    }
    Ok(json!({"valid": valid, "types": report}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn source(dir: &TempDir) -> Source {
        let defs = json!([
            {
                "name": "Dog",
                "fields": [
                    {"name": "name", "type": "string", "required": true},
                    {"name": "age", "type": "int"}
                ]
            }
        ]);
        let data = json!({
            "Dog": [
                {"_id": "d1", "name": "Rex", "age": 3},
                {"_id": "d2", "name": "Fido", "age": 7},
                {"_id": "d3", "name": "Spot", "age": 5}
            ]
        });
        Source {
            defs: write(dir, "defs.json", &defs),
            data: Some(write(dir, "data.json", &data)),
            config: None,
        }
    }

    #[test]
    fn test_query_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        let args = QueryArgs {
            type_name: "Dog".into(),
            select: Some("name".into()),
            filter: Some("age > 3".into()),
            order_by: Some("age desc".into()),
            limit: None,
            offset: None,
            backfill: None,
            dump_style: DumpStyle::Nested,
        };
        let out = query(&source(&dir), &args).unwrap();
        assert_eq!(out["count"], json!(2));
        assert_eq!(out["results"][0]["name"], json!("Fido"));
        assert_eq!(out["results"][1]["name"], json!("Spot"));
    }

    #[test]
    fn test_query_side_loaded_results() {
        let dir = TempDir::new().unwrap();
        let args = QueryArgs {
            type_name: "Dog".into(),
            select: None,
            filter: Some("age < 6".into()),
            order_by: Some("age".into()),
            limit: None,
            offset: None,
            backfill: None,
            dump_style: DumpStyle::SideLoaded,
        };
        let out = query(&source(&dir), &args).unwrap();
        assert_eq!(out["count"], json!(2));
        assert_eq!(out["results"]["target"][0]["name"], json!("Rex"));
        assert_eq!(out["results"]["target"][1]["name"], json!("Spot"));
        assert!(out["results"]["links"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_validate_reports_bad_records() {
        let dir = TempDir::new().unwrap();
        let mut src = source(&dir);
        src.data = Some(write(
            &dir,
            "bad.json",
            &json!({"Dog": [{"name": "Rex", "age": "old"}, {"age": 2}]}),
        ));
        let out = validate(&src).unwrap();
        assert_eq!(out["valid"], json!(false));
        assert_eq!(out["types"]["Dog"]["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_generate_count() {
        let dir = TempDir::new().unwrap();
        let out = generate(&source(&dir), "Dog", 3).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 3);
    }
}
