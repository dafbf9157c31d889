// Machine inventory - the configured guests, addressable by name

use std::collections::HashSet;

use crate::domain::Machine;
use crate::error::{AppError, Result};

/// Configured machines, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    machines: Vec<Machine>,
}

impl Inventory {
    /// Build an inventory, rejecting duplicate names
    pub fn new(machines: Vec<Machine>) -> Result<Self> {
        let mut seen = HashSet::new();
        for machine in &machines {
            if machine.name.trim().is_empty() {
                return Err(crate::domain::DomainError::EmptyMachineName.into());
            }
            if !seen.insert(machine.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate machine name: {}",
                    machine.name
                )));
            }
        }
        Ok(Self { machines })
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&Machine> {
        self.machines
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AppError::NotFound(format!("machine {}", name)))
    }

    /// Machines named in `names`, in that order; all machines when empty
    pub fn select(&self, names: &[String]) -> Result<Vec<Machine>> {
        if names.is_empty() {
            return Ok(self.machines.clone());
        }
        names
            .iter()
            .map(|name| self.get(name).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Inventory {
        Inventory::new(vec![
            Machine::new("web").unwrap().with_address("192.168.50.10"),
            Machine::new("db").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Inventory::new(vec![
            Machine::new("web").unwrap(),
            Machine::new("web").unwrap(),
        ]);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_get_unknown_machine() {
        let err = inventory().get("cache").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(err.to_string().contains("cache"));
    }

    #[test]
    fn test_select_all_when_no_names() {
        let selected = inventory().select(&[]).unwrap();
        let names: Vec<&str> = selected.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["web", "db"]);
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let selected = inventory()
            .select(&["db".to_string(), "web".to_string()])
            .unwrap();
        assert_eq!(selected[0].name, "db");
        assert_eq!(selected[1].target(), "192.168.50.10");
    }
}
