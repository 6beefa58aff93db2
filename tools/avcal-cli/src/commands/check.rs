//! Check device access.

use avcal_platform_linux::permissions;

pub fn run() -> anyhow::Result<()> {
    println!("avcal System Check");
    println!("{}", "=".repeat(50));

    let access = permissions::camera_access();
    println!(
        "[{}] Camera nodes: {} present, {} readable",
        if access.is_denied() { "FAIL" } else { "OK" },
        access.nodes.len(),
        access.readable.len()
    );
    for node in &access.nodes {
        let marker = if access.readable.contains(node) {
            ""
        } else {
            " (no access)"
        };
        println!("     {}{marker}", node.display());
    }

    let capabilities = permissions::check_capabilities();
    println!();
    permissions::print_capability_report(&capabilities);

    let all_required_ok = capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available);

    println!();
    if all_required_ok {
        println!("All required capabilities are available. avcal is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
