use colored::Colorize;
use stackflow_core::DependencyGraph;

pub fn handle(stack: &str) -> anyhow::Result<()> {
    let loaded = super::load(stack)?;
    let nodes = loaded.stack.nodes();
    let graph = DependencyGraph::build(nodes)?;

    println!("Stack: {}", loaded.config.stack.cyan());
    println!();
    println!("{}", "Realization order:".bold());
    for (step, &index) in graph.order().iter().enumerate() {
        let node = &nodes[index];
        let depends_on: Vec<&str> = graph
            .dependencies(index)
            .iter()
            .map(|&dep| graph.name(dep))
            .collect();
        if depends_on.is_empty() {
            println!("  {}. {} ({})", step + 1, node.name().cyan(), node.kind());
        } else {
            println!(
                "  {}. {} ({}) after {}",
                step + 1,
                node.name().cyan(),
                node.kind(),
                depends_on.join(", ")
            );
        }
    }

    if !loaded.stack.exports().is_empty() {
        println!();
        println!("{}", "Exports:".bold());
        for export in loaded.stack.exports() {
            let marker = if export.value.is_secret() {
                " (secret)"
            } else {
                ""
            };
            println!("  {}{}", export.name.cyan(), marker);
        }
    }

    Ok(())
}
