use colored::Colorize;
use fabric_deploy_core::{
    BindingOutcome, BindingResult, ContentItem, DeploymentOutcome, ReconcileReport,
    RoleAssignment, Summary, WorkspaceResolution,
};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_workspace(resolution: &WorkspaceResolution) {
    let ws = resolution.workspace();
    let how = match resolution {
        WorkspaceResolution::Found(_) => "found",
        WorkspaceResolution::Created(_) => "created",
        WorkspaceResolution::Conflict(_) => "already existed (resolved after conflict)",
    };
    print_success(&format!(
        "Workspace {} {} ({})",
        ws.display_name.cyan(),
        how,
        ws.id
    ));
    if let Some(capacity) = &ws.capacity_id {
        println!("{}: {}", "Capacity".cyan(), capacity);
    }
}

pub fn print_role_assignments(title: &str, assignments: &[RoleAssignment]) {
    println!("{}", title.bold());
    if assignments.is_empty() {
        println!("No role assignments found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Principal", "Type", "Role"]);
    for a in assignments {
        builder.push_record([
            a.principal.id.clone(),
            format!("{:?}", a.principal.kind),
            a.role.to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn binding_status(outcome: &BindingOutcome) -> String {
    match outcome {
        BindingOutcome::AlreadyPresent => "present".dimmed().to_string(),
        BindingOutcome::Created => "granted".green().to_string(),
        BindingOutcome::AlreadyAssigned => "already assigned".dimmed().to_string(),
        BindingOutcome::PermissionDenied { .. } => "manual grant needed".yellow().to_string(),
        BindingOutcome::Failed { status: Some(s), .. } => format!("failed ({s})").red().to_string(),
        BindingOutcome::Failed { status: None, .. } => "failed".red().to_string(),
        BindingOutcome::Skipped => "skipped".dimmed().to_string(),
    }
}

fn binding_detail(outcome: &BindingOutcome) -> &str {
    match outcome {
        BindingOutcome::PermissionDenied { detail } | BindingOutcome::Failed { detail, .. } => {
            detail
        }
        _ => "",
    }
}

fn print_binding_results(results: &[BindingResult]) {
    if results.is_empty() {
        println!("No role assignments configured.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Principal", "Object id", "Role", "Result", "Detail"]);
    for r in results {
        builder.push_record([
            r.principal.clone(),
            r.principal_id.clone().unwrap_or_else(|| "-".into()),
            r.role.to_string(),
            binding_status(&r.outcome),
            binding_detail(&r.outcome).to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));

    if results
        .iter()
        .any(|r| matches!(r.outcome, BindingOutcome::PermissionDenied { .. }))
    {
        print_warning(
            "ACTION REQUIRED: grant the service principal Admin on the workspace, then re-run",
        );
    }
}

/// Before listing, per-binding results and after listing.
pub fn print_bindings(report: &ReconcileReport) {
    if report.listing_denied {
        println!(
            "{}",
            "Current role assignments are not visible yet; every binding was attempted.".dimmed()
        );
    } else {
        print_role_assignments("Role assignments before", &report.before);
    }
    print_binding_results(&report.results);
    if !report.after.is_empty() {
        print_role_assignments("Role assignments after", &report.after);
    }
}

pub fn print_catalog(items: &[ContentItem]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Name", "Type", "Definition"]);
    for item in items {
        builder.push_record([
            item.display_name.clone(),
            item.item_type.to_string(),
            item.definition_path.display().to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
    println!("Total: {}", items.len());
}

pub fn print_outcomes(outcomes: &[DeploymentOutcome]) {
    let mut builder = Builder::default();
    builder.push_record(["Item", "Type", "Status", "Result"]);
    for o in outcomes {
        let status = o
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        let result = if o.succeeded {
            match &o.error_detail {
                Some(note) => note.dimmed().to_string(),
                None => "deployed".green().to_string(),
            }
        } else {
            o.error_detail
                .as_deref()
                .unwrap_or("failed")
                .red()
                .to_string()
        };
        builder.push_record([
            o.item.display_name.clone(),
            o.item.item_type.to_string(),
            status,
            result,
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_summary(summary: &Summary) {
    print_workspace(&summary.workspace);
    println!();
    print_bindings(&summary.bindings);
    println!();
    print_outcomes(&summary.outcomes);

    let line = format!(
        "Successfully deployed: {}/{} items",
        summary.succeeded(),
        summary.total()
    );
    if summary.is_complete() {
        print_success(&line);
    } else {
        print_warning(&line);
    }
}
