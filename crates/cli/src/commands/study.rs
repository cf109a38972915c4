use crate::cli::StudyCommand;
use crate::commands::AppContext;
use crate::output::print_header;
use anyhow::Result;
use qcnorm_core::{CreateStudyRequest, UpdateStudyRequest};

pub async fn run(ctx: &AppContext, cmd: StudyCommand) -> Result<()> {
    let store = ctx.study_store().await?;
    match cmd {
        StudyCommand::Create {
            name,
            normative_dataset,
            created_by,
        } => {
            let config = store
                .create(CreateStudyRequest {
                    study_name: name,
                    normative_dataset,
                    custom_age_groups: None,
                    custom_thresholds: None,
                    exclusion_criteria: Vec::new(),
                    created_by,
                })
                .await?;
            print_one(ctx, &config);
        }
        StudyCommand::Update {
            name,
            normative_dataset,
            exclusion_criteria,
        } => {
            let config = store
                .update(
                    &name,
                    UpdateStudyRequest {
                        normative_dataset,
                        custom_age_groups: None,
                        custom_thresholds: None,
                        exclusion_criteria,
                    },
                )
                .await?;
            print_one(ctx, &config);
        }
        StudyCommand::Show { name } => {
            let config = store.require(&name).await?;
            print_one(ctx, &config);
        }
        StudyCommand::List => {
            let configs = store.list().await?;
            if ctx.json {
                println!("{}", serde_json::to_string(&configs)?);
            } else {
                print_header("Studies");
                if configs.is_empty() {
                    println!("  (none)");
                }
                for config in &configs {
                    println!("  {:<24} dataset={}", config.study_name, config.normative_dataset);
                }
            }
        }
        StudyCommand::Delete { name } => {
            let deleted = store.delete(&name).await?;
            if ctx.json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else if deleted {
                println!("  deleted study '{name}'");
            } else {
                println!("  no such study '{name}'");
            }
        }
    }
    Ok(())
}

fn print_one(ctx: &AppContext, config: &qcnorm_shared::StudyConfiguration) {
    if ctx.json {
        println!("{}", serde_json::to_string(config).unwrap_or_default());
        return;
    }
    print_header(&config.study_name);
    println!("  normative_dataset: {}", config.normative_dataset);
    println!("  created_by:        {}", config.created_by);
    println!("  created_at:        {}", config.created_at);
    println!(
        "  custom_age_groups:  {}",
        config.custom_age_groups.as_ref().map_or(0, Vec::len)
    );
    println!(
        "  custom_thresholds:  {}",
        config.custom_thresholds.as_ref().map_or(0, Vec::len)
    );
    println!("  exclusion_criteria: {}", config.exclusion_criteria.join(", "));
}
