//! Interactive immediate remap of the field/team mapping table.
//!
//! Talks to a running field-kernel's admin API. This will disrupt any
//! teams currently on the field!

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

#[tokio::main]
async fn main() -> Result<()> {
    let addr = std::env::var("BEST_FIELD_ADDR").unwrap_or_else(|_| "localhost:8080".into());
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let quads: Vec<String> = client
        .get(format!("{base}/admin/cfg/quads"))
        .send()
        .await
        .context("getting quads")?
        .json()
        .await
        .context("decoding quads")?;

    let current: HashMap<String, String> = client
        .get(format!("{base}/admin/map/current"))
        .send()
        .await
        .context("getting current map")?
        .json()
        .await
        .context("decoding current map")?;

    if !current.is_empty() {
        println!("Current mapping:");
        for quad in &quads {
            if let Some(team) = current.get(quad) {
                println!("  {quad}:\t{team}");
            }
        }
        println!();
    }
    println!("Enter new mapping (team number; empty leaves the quad open)");

    let stdin = io::stdin();
    let mut new_map = HashMap::new();
    for quad in &quads {
        let default = current.get(quad).cloned().unwrap_or_default();
        loop {
            print!("{quad} [{default}]: ");
            io::stdout().flush()?;
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            let answer = line.trim();
            let answer = if answer.is_empty() { default.as_str() } else { answer };
            if answer.is_empty() {
                break;
            }
            if answer.chars().all(|c| c.is_ascii_digit()) {
                new_map.insert(quad.clone(), answer.to_string());
                break;
            }
            eprintln!("team number must be a number");
        }
    }

    let resp = client
        .post(format!("{base}/admin/map/immediate"))
        .json(&new_map)
        .send()
        .await
        .context("submitting mapping")?;

    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("remap rejected: {body}");
    }
    println!("Mapping applied.");
    Ok(())
}
