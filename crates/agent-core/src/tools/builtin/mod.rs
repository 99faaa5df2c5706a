//! Built-in tools for the agent framework

mod read_file;
mod shell;
mod write_file;

pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use write_file::WriteFileTool;

use super::registry::ToolRegistry;

/// Create a registry with all default tools
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(ReadFileTool);
    registry.register(WriteFileTool);
    registry.register(ShellTool);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["read_file", "write_file", "shell"]);
    }
}
