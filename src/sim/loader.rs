//! Assembly program loader.
//!
//! Consumes the line-oriented textual program and produces the
//! instruction vector, the label-to-PC map, and the initial main-memory
//! image. `.data` words are laid down little-endian from address 0;
//! `.text` labels resolve to 0-based instruction indices. Comments start
//! with `#`; `.globl` is ignored.

use crate::common::SimError;
use crate::mem::MemoryHierarchy;
use std::collections::HashMap;
use std::fs;

/// A loaded program: raw instruction lines plus the shared label map.
#[derive(Debug, Default, Clone)]
pub struct Program {
    pub instructions: Vec<String>,
    pub labels: HashMap<String, usize>,
}

pub fn load_program_file(
    path: &str,
    hierarchy: &mut MemoryHierarchy,
) -> Result<Program, SimError> {
    let source = fs::read_to_string(path)
        .map_err(|e| SimError::Parse(format!("could not open {}: {}", path, e)))?;
    load_program(&source, hierarchy)
}

pub fn load_program(source: &str, hierarchy: &mut MemoryHierarchy) -> Result<Program, SimError> {
    let mut program = Program::default();
    let mut in_data = false;

    // Data words may continue across lines; they are accumulated until the
    // next label or section switch and then flushed sequentially.
    let mut data_pointer: u32 = 0;
    let mut accumulated = String::new();

    for raw_line in source.lines() {
        let line = match raw_line.split_once('#') {
            Some((before, _)) => before,
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('.') {
            if line.starts_with(".data") {
                flush_data(&mut accumulated, &mut data_pointer, hierarchy)?;
                in_data = true;
                continue;
            }
            if line.starts_with(".text") {
                flush_data(&mut accumulated, &mut data_pointer, hierarchy)?;
                in_data = false;
                continue;
            }
            if line.starts_with(".globl") {
                continue;
            }
        }

        if in_data {
            if let Some((label, rest)) = line.split_once(':') {
                flush_data(&mut accumulated, &mut data_pointer, hierarchy)?;
                program
                    .labels
                    .insert(strip_label(label.trim()), data_pointer as usize);

                let rest = rest.trim();
                let rest = match rest.find(".word") {
                    Some(pos) => rest[pos + ".word".len()..].trim(),
                    None => rest,
                };
                accumulated = rest.to_string();
            } else if accumulated.is_empty() {
                accumulated = line.to_string();
            } else {
                accumulated = format!("{},{}", accumulated, line);
            }
        } else if let Some((label, rest)) = line.split_once(':') {
            program
                .labels
                .insert(strip_label(label.trim()), program.instructions.len());
            let rest = rest.trim();
            if !rest.is_empty() {
                program.instructions.push(rest.to_string());
            }
        } else {
            program.instructions.push(line.to_string());
        }
    }

    flush_data(&mut accumulated, &mut data_pointer, hierarchy)?;
    Ok(program)
}

fn flush_data(
    accumulated: &mut String,
    data_pointer: &mut u32,
    hierarchy: &mut MemoryHierarchy,
) -> Result<(), SimError> {
    if accumulated.is_empty() {
        return Ok(());
    }
    for token in accumulated.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let value: i32 = token
            .parse()
            .map_err(|_| SimError::Parse(format!("malformed data word '{}'", token)))?;
        hierarchy.set_memory_word(*data_pointer, value);
        *data_pointer += 4;
    }
    accumulated.clear();
    Ok(())
}

fn strip_label(label: &str) -> String {
    label.strip_prefix('.').unwrap_or(label).to_string()
}
