use anyhow::{Context, Result};
use comfy_table::{CellAlignment, Table};
use sofa_cli::run::{GoldRunResult, RunOptions, load_config, run_gold};
use sofa_model::{OrganSystem, SofaParameter};

use crate::cli::{ConfigArgs, RunArgs};
use crate::summary::{align_column, apply_table_style};

pub fn run_scoring(args: &RunArgs) -> Result<GoldRunResult> {
    let options = RunOptions {
        measurements: args.measurements.clone(),
        stays: args.stays.clone(),
        diagnoses: args.diagnoses.clone(),
        config: args.config.clone(),
        output: args.output.clone(),
        summary_json: args.summary_json.clone(),
        validation_json: args.validation_json.clone(),
        log_data: args.log_data,
    };
    run_gold(&options)
}

pub fn run_parameters() {
    let mut table = Table::new();
    table.set_header(vec![
        "System",
        "Parameter",
        "Aggregation",
        "OMOP concept",
        "Unit",
        "Imputed",
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Center);
    for system in OrganSystem::ALL {
        for parameter in SofaParameter::for_system(system) {
            let spec = parameter.spec();
            table.add_row(vec![
                system.label().to_string(),
                spec.name.to_string(),
                spec.aggregation.as_str().to_string(),
                spec.omop_concept.to_string(),
                spec.unit.to_string(),
                if spec.imputable { "yes" } else { "no" }.to_string(),
            ]);
        }
    }
    println!("{table}");
}

pub fn run_config(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let text = config.to_toml_string().context("serialize configuration")?;
    print!("{text}");
    Ok(())
}
