//! `robovox skills`: list the skill catalogue.

use robovox_robot::catalogue_schema;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let schema = catalogue_schema();

    if json {
        println!("{}", serde_json::to_string_pretty(&schema.tool_definitions())?);
        return Ok(());
    }

    println!("  {} skills:", schema.len());
    println!();
    for spec in schema.specs() {
        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| {
                if a.required {
                    a.name.clone()
                } else {
                    format!("[{}]", a.name)
                }
            })
            .collect();
        println!("  {:<20} {:<14} {}", spec.name, spec.concurrency.to_string(), args.join(" "));
        println!("  {:<20} {}", "", spec.description);
    }
    Ok(())
}
