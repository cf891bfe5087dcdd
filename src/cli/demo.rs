//! `fog demo`: render a fixed sample document through the chosen output format, with no provider
//! calls. Peripheral per spec.md §6 — only the output-format enum is specified in detail.

use crate::{
    cli::{args::OutputFormat, Global},
    output::{Document, OutputSink, TextOutputSink},
};

/// Render a sample document through the chosen output format, without contacting any provider.
#[derive(Debug, clap::Parser)]
pub struct Args {
    #[clap(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

pub fn run(global: &Global, args: Args) -> i32 {
    let document = Document::new()
        .title("demo")
        .header(["Logical Id", "Action", "Status"])
        .row(["VpcA", "Add", "CREATE_COMPLETE"])
        .row(["SubnetA", "Modify", "UPDATE_COMPLETE"])
        .row(["SubnetB", "Remove", "DELETE_COMPLETE"]);

    match args.format {
        OutputFormat::Table => TextOutputSink::new(global.color()).render(&document),
        OutputFormat::Csv => render_csv(&document),
        OutputFormat::Json => render_json(&document),
        OutputFormat::Yaml => render_yaml(&document),
        OutputFormat::Markdown => render_markdown(&document),
        OutputFormat::Html => render_html(&document),
        OutputFormat::Dot => render_dot(&document),
    }

    0
}

fn render_csv(document: &Document) {
    println!("{}", document.header.join(","));
    for row in &document.rows {
        println!("{}", row.join(","));
    }
}

fn render_json(document: &Document) {
    let rows: Vec<serde_json::Value> = document
        .rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for (key, value) in document.header.iter().zip(row.iter()) {
                object.insert(key.clone(), serde_json::Value::String(value.clone()));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
}

fn render_yaml(document: &Document) {
    let rows: Vec<_> = document
        .rows
        .iter()
        .map(|row| document.header.iter().cloned().zip(row.iter().cloned()).collect::<std::collections::BTreeMap<_, _>>())
        .collect();
    println!("{}", serde_yaml::to_string(&rows).unwrap_or_default());
}

fn render_markdown(document: &Document) {
    println!("| {} |", document.header.join(" | "));
    println!("| {} |", document.header.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
    for row in &document.rows {
        println!("| {} |", row.join(" | "));
    }
}

fn render_html(document: &Document) {
    println!("<table>");
    println!("<tr>{}</tr>", document.header.iter().map(|h| format!("<th>{h}</th>")).collect::<String>());
    for row in &document.rows {
        println!("<tr>{}</tr>", row.iter().map(|c| format!("<td>{c}</td>")).collect::<String>());
    }
    println!("</table>");
}

fn render_dot(document: &Document) {
    println!("digraph demo {{");
    for row in &document.rows {
        if let Some(id) = row.first() {
            println!("  \"{id}\";");
        }
    }
    println!("}}");
}
