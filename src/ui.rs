use colored::*;

use crate::{
    models::project::Project,
    services::{
        intake::SubmitProjectResult,
        sweep::SweepReport,
        sync::{FailurePolicy, SyncReport},
    },
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

/// Format a creation timestamp for display (e.g., "Today", "Yesterday", "Feb 15")
fn format_created_date(timestamp: jiff::Timestamp) -> String {
    let zoned = jiff::Zoned::new(timestamp, jiff::tz::TimeZone::system());
    let date = zoned.date();
    let today = jiff::Zoned::now().date();

    if date == today {
        "Today".to_string()
    } else if today.yesterday().is_ok_and(|yesterday| date == yesterday) {
        "Yesterday".to_string()
    } else {
        date.strftime("%b %d, %Y").to_string()
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    println!(
        "\n  {} ({})\n",
        title.cyan().bold(),
        plural(count, "project", "projects")
    );
}

/// Render a section header (e.g., "Skipped", "Failed")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Render one gallery entry: title with right-aligned date, then details
pub fn render_project(project: &Project) {
    let terminal_width = get_terminal_width();

    let title = if project.project_title.is_empty() {
        "(untitled)"
    } else {
        project.project_title.as_str()
    };
    let left_section = format!("  {}  {}", "•".green(), title.bold());
    let left_visible_len = 5 + title.chars().count();

    match project.created_at.map(format_created_date) {
        Some(date) if left_visible_len + date.chars().count() + 4 < terminal_width => {
            let padding = terminal_width - left_visible_len - date.chars().count() - 2;
            println!("{}{}{}", left_section, " ".repeat(padding), date.dimmed());
        }
        _ => println!("{}", left_section),
    }

    let mut meta_parts = vec![];
    if !project.student_name.is_empty() {
        meta_parts.push(project.student_name.blue().to_string());
    }
    if let Some(slug) = project.slug() {
        meta_parts.push(format!("/{}", slug));
    }
    if !project.status.is_empty() {
        meta_parts.push(project.status.dimmed().to_string());
    }
    if !meta_parts.is_empty() {
        println!("     {}", meta_parts.join(&format!(" {} ", "•".dimmed())));
    }

    if !project.description.is_empty() {
        println!("     {}", project.description);
    }
    if let Some(url) = project.html_file_url() {
        println!("     {}", url.dimmed());
    }

    println!("     {}", "─".repeat(30).dimmed());
}

pub fn render_gallery(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects submitted yet");
        return;
    }

    render_view_header("STUDENT PROJECTS", projects.len());
    for project in projects {
        render_project(project);
    }
    println!();
}

pub fn render_submission(result: &SubmitProjectResult) {
    println!("✓ Project submitted with slug {}", result.slug.bold());
    println!("  id:  {}", result.id.to_string().dimmed());
    println!("  url: {}", result.html_file_url.dimmed());
}

pub fn render_sync_report(report: &SyncReport) {
    let counts = report.counts();

    if counts.total == 0 {
        println!("No projects to sync");
        return;
    }

    if !report.written.is_empty() {
        render_section_header(&format!("Published ({})", counts.written));
        for slug in &report.written {
            println!("  {} {}/index.html", "✓".green(), slug);
        }
    }

    if !report.skipped.is_empty() {
        render_section_header(&format!("Skipped ({})", counts.skipped));
        for skipped in &report.skipped {
            let title = if skipped.title.is_empty() {
                skipped.id.to_string()
            } else {
                skipped.title.clone()
            };
            let slug = skipped
                .slug
                .as_deref()
                .filter(|slug| !slug.is_empty())
                .map(|slug| format!(" /{}", slug))
                .unwrap_or_default();
            println!(
                "  {} {}{} {}",
                "⚠".yellow(),
                title,
                slug.dimmed(),
                format!("({})", skipped.reason).dimmed()
            );
        }
    }

    if !report.failed.is_empty() {
        render_section_header(&format!("Failed ({})", counts.failed));
        for failed in &report.failed {
            println!("  {} {}", "✗".red(), failed.slug.bold());
            println!("    {}", failed.error.dimmed());
        }
    }

    println!();
    if report.aborted {
        println!(
            "{} Sync stopped at the first failure; {} left untouched",
            "✗".red(),
            plural(counts.untouched, "project", "projects")
        );
        if report.policy == FailurePolicy::Abort {
            println!("  Re-run with --continue-on-error to process the remaining projects");
        }
    } else if report.is_success() {
        println!(
            "{} Sync complete: {} published, {} skipped",
            "✓".green(),
            counts.written,
            counts.skipped
        );
    } else {
        println!(
            "{} Sync finished with {}: {} published, {} skipped",
            "✗".red(),
            plural(counts.failed, "failure", "failures"),
            counts.written,
            counts.skipped
        );
    }
}

pub fn render_sweep_report(report: &SweepReport, dry_run: bool) {
    if report.orphans.is_empty() {
        println!("No orphaned artifacts found");
    } else {
        let verb = if dry_run { "Would delete" } else { "Orphaned" };
        render_section_header(&format!("{} ({})", verb, report.orphans.len()));
        for key in &report.orphans {
            println!("  {} {}", "•".dimmed(), key);
        }
    }

    if report.recent > 0 {
        println!(
            "\n  {} too recent to delete",
            plural(report.recent, "unreferenced artifact", "unreferenced artifacts")
        );
    }

    if !dry_run && !report.deleted.is_empty() {
        println!(
            "\n✓ {} ({} bytes reclaimed)",
            plural(report.deleted.len(), "artifact deleted", "artifacts deleted"),
            report.reclaimed_bytes
        );
    }

    for failed in &report.failed {
        eprintln!("Error: Failed to delete '{}': {}", failed.key, failed.error);
    }
}
