use colored::*;
use repocensus_core::discovery::LocalReport;
use repocensus_core::{CrawlSummary, RepoMeta};
use std::path::Path;

/// Format seconds as `m:ss`, or `Ns` below a minute.
fn format_duration(secs: f64) -> String {
    let total_secs = secs.round() as u64;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{}:{:02}", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn highlight_nonzero(count: usize) -> String {
    if count > 0 {
        count.to_string().yellow().bold().to_string()
    } else {
        "0".to_string()
    }
}

/// Print the outcome of a crawl run.
pub fn print_crawl_summary(org: &str, output: &Path, summary: &CrawlSummary) {
    println!();
    println!(
        "{}",
        format!(" repocensus v{} - Crawled {}", env!("CARGO_PKG_VERSION"), org).bold()
    );
    println!();

    println!(" {}", "Repositories".bold().underline());
    println!(" {} Listed:            {} ({} pages)", "|-".dimmed(), summary.listed, summary.pages);
    println!(" {} Imported:          {}", "|-".dimmed(), summary.imported.to_string().green());
    println!(" {} Archived skipped:  {}", "|-".dimmed(), summary.skipped_archived);
    println!(" {} Fetch failures:    {}", "|-".dimmed(), highlight_nonzero(summary.fetch_failures));
    println!(" {} Not found:         {}", "|-".dimmed(), highlight_nonzero(summary.skipped_missing));
    println!();

    println!(" {}", "Run".bold().underline());
    println!(" {} API calls:         {}", "|-".dimmed(), summary.api_calls);
    println!(" {} Duration:          {}", "|-".dimmed(), format_duration(summary.duration_secs));
    println!(" {} Output:            {}", "|-".dimmed(), output.display().to_string().cyan());

    if summary.capped {
        println!();
        println!(" {} Debug cap reached, listing stopped early", "NOTE".yellow().bold());
    }
    if summary.cancelled {
        println!();
        println!(" {} Run was interrupted, results are partial", "WARN".red().bold());
    }
    println!();
}

/// Print where a repository listing was stored.
pub fn print_list_summary(org: &str, path: &Path, repos: &[RepoMeta], api_calls: u64) {
    let archived = repos.iter().filter(|r| r.archived).count();
    let private = repos.iter().filter(|r| r.private).count();

    println!();
    println!("{}", format!(" repocensus - {} repositories", org).bold());
    println!();
    println!(" {} Total:     {}", "|-".dimmed(), repos.len());
    println!(" {} Archived:  {}", "|-".dimmed(), archived);
    println!(" {} Private:   {}", "|-".dimmed(), private);
    println!(" {} API calls: {}", "|-".dimmed(), api_calls);
    println!(" {} Stored:    {}", "|-".dimmed(), path.display().to_string().cyan());
    println!();
}

/// Print a local checkout analysis to the terminal.
pub fn print_local_report(report: &LocalReport) {
    let inventory = &report.inventory;

    println!();
    println!(
        "{}",
        format!(" repocensus v{} - Analyzing {}", env!("CARGO_PKG_VERSION"), report.root).bold()
    );
    println!();

    println!(" {}", "Dependencies".bold().underline());
    println!(
        " {} {} declared across {} files",
        "|-".dimmed(),
        inventory.dependency_count(),
        report.dependency_files.len()
    );
    for (ecosystem, count) in inventory.by_ecosystem() {
        println!(" {} {}: {}", "|-".dimmed(), ecosystem.to_string().cyan(), count);
    }
    let unparsed = inventory.unparsed_count();
    if unparsed > 0 {
        println!(
            " {} {} with unresolved version variables",
            "|-".dimmed(),
            unparsed.to_string().yellow().bold()
        );
    }
    println!();

    println!(" {}", "Lockfiles".bold().underline());
    if report.lockfile_pairings.is_empty() {
        println!(" {} No manifests found", "|-".dimmed());
    }
    for pairing in &report.lockfile_pairings {
        let lock = if pairing.lockfile_path.is_empty() {
            "missing".red().bold().to_string()
        } else {
            pairing.lockfile_path.green().to_string()
        };
        println!(
            " {} [{}] {} -> {}",
            "|-".dimmed(),
            pairing.ecosystem,
            pairing.manifest_path,
            lock
        );
    }
    if report.has_complete_lockfiles {
        println!(" {} Every manifest has a lockfile", "OK".green().bold());
    }
    println!();

    println!(" {}", "Dockerfiles".bold().underline());
    if inventory.dockerfiles.is_empty() {
        println!(" {} None found", "|-".dimmed());
    }
    for docker in &inventory.dockerfiles {
        let f = &docker.analysis.features;
        let base = if f.base_tag.is_empty() {
            f.base_image.clone()
        } else {
            format!("{}:{}", f.base_image, f.base_tag)
        };
        println!(
            " {} {} ({} stage{}, base {})",
            "|-".dimmed(),
            docker.path.bold(),
            f.stage_count,
            if f.stage_count == 1 { "" } else { "s" },
            base.cyan()
        );
        if f.uses_latest_tag {
            println!("   {} {}", "|".dimmed(), "pins a latest tag".yellow());
        }
        if !f.has_user_instruction {
            println!("   {} {}", "|".dimmed(), "no USER instruction, runs as root".yellow());
        }
        if f.has_secrets_in_env_or_arg {
            println!("   {} {}", "|".dimmed(), "secret-like ENV or ARG".red());
        }
        if f.has_copy_sensitive {
            println!("   {} {}", "|".dimmed(), "copies sensitive paths".red());
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(4.4), "4s");
        assert_eq!(format_duration(125.0), "2:05");
    }
}
