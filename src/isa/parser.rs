use super::{Instruction, Opcode};
use crate::common::{SimError, NUM_REGISTERS, REG_CORE_ID};

/// Parses one textual instruction into its decoded form.
///
/// The text has already been stripped of comments and labels by the
/// program loader; this only sees the mnemonic and its operands.
pub fn parse_instruction(raw: &str) -> Result<Instruction, SimError> {
    let raw = raw.trim();
    let (mnemonic, rest) = match raw.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r),
        None => (raw, ""),
    };

    let opcode = match mnemonic {
        "add" => Opcode::Add,
        "addi" => Opcode::Addi,
        "sub" => Opcode::Sub,
        "slt" => Opcode::Slt,
        "mul" => Opcode::Mul,
        "lw" => Opcode::Lw,
        "sw" => Opcode::Sw,
        "lw_spm" => Opcode::LwSpm,
        "sw_spm" => Opcode::SwSpm,
        "beq" => Opcode::Beq,
        "bne" => Opcode::Bne,
        "blt" => Opcode::Blt,
        "bge" => Opcode::Bge,
        "j" => Opcode::J,
        "jal" => Opcode::Jal,
        "la" => Opcode::La,
        "sync" => Opcode::Sync,
        "halt" => Opcode::Halt,
        "invld1" => Opcode::Invld1,
        other => {
            return Err(SimError::Parse(format!(
                "unknown opcode '{}' in '{}'",
                other, raw
            )))
        }
    };

    let mut inst = Instruction::new(opcode);
    let operands = split_operands(rest);

    match opcode {
        Opcode::Add | Opcode::Sub | Opcode::Slt | Opcode::Mul => {
            expect_operands(raw, &operands, 3)?;
            inst.rd = Some(parse_register(&operands[0], raw)?);
            inst.rs1 = Some(parse_register(&operands[1], raw)?);
            inst.rs2 = Some(parse_register(&operands[2], raw)?);
        }
        Opcode::Addi => {
            expect_operands(raw, &operands, 3)?;
            inst.rd = Some(parse_register(&operands[0], raw)?);
            inst.rs1 = Some(parse_register(&operands[1], raw)?);
            inst.immediate = parse_immediate(&operands[2], raw)?;
        }
        Opcode::Lw | Opcode::LwSpm => {
            expect_operands(raw, &operands, 2)?;
            inst.rd = Some(parse_register(&operands[0], raw)?);
            let (imm, base) = parse_offset_base(&operands[1], raw)?;
            inst.immediate = imm;
            inst.rs1 = Some(base);
        }
        Opcode::Sw | Opcode::SwSpm => {
            expect_operands(raw, &operands, 2)?;
            inst.rs2 = Some(parse_register(&operands[0], raw)?);
            let (imm, base) = parse_offset_base(&operands[1], raw)?;
            inst.immediate = imm;
            inst.rs1 = Some(base);
        }
        Opcode::Beq | Opcode::Bne | Opcode::Blt | Opcode::Bge => {
            expect_operands(raw, &operands, 3)?;
            let rs1 = parse_register(&operands[0], raw)?;
            inst.rs1 = Some(rs1);
            if opcode == Opcode::Beq && rs1 == REG_CORE_ID {
                // Core-id dispatch form: the second operand is a literal id.
                inst.core_dispatch = Some(parse_immediate(&operands[1], raw)? as usize);
            } else {
                inst.rs2 = Some(parse_register(&operands[1], raw)?);
            }
            inst.label = Some(strip_label(&operands[2]));
        }
        Opcode::J => {
            expect_operands(raw, &operands, 1)?;
            inst.label = Some(strip_label(&operands[0]));
        }
        Opcode::Jal => {
            if operands.len() == 1 {
                // `jal label` without a destination links nothing.
                inst.label = Some(strip_label(&operands[0]));
            } else {
                expect_operands(raw, &operands, 2)?;
                inst.rd = Some(parse_register(&operands[0], raw)?);
                inst.label = Some(strip_label(&operands[1]));
            }
        }
        Opcode::La => {
            expect_operands(raw, &operands, 2)?;
            inst.rd = Some(parse_register(&operands[0], raw)?);
            inst.label = Some(strip_label(&operands[1]));
        }
        Opcode::Sync | Opcode::Halt | Opcode::Invld1 => {}
    }

    Ok(inst)
}

fn split_operands(rest: &str) -> Vec<String> {
    let rest = match rest.split_once('#') {
        Some((before, _)) => before,
        None => rest,
    };
    rest.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn expect_operands(raw: &str, operands: &[String], count: usize) -> Result<(), SimError> {
    if operands.len() < count {
        return Err(SimError::Parse(format!(
            "'{}' expects {} operands, got {}",
            raw,
            count,
            operands.len()
        )));
    }
    Ok(())
}

fn parse_register(token: &str, raw: &str) -> Result<usize, SimError> {
    let index = token
        .strip_prefix('x')
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| SimError::Parse(format!("malformed register '{}' in '{}'", token, raw)))?;
    if index >= NUM_REGISTERS {
        return Err(SimError::Parse(format!(
            "register index out of range '{}' in '{}'",
            token, raw
        )));
    }
    Ok(index)
}

fn parse_immediate(token: &str, raw: &str) -> Result<i32, SimError> {
    token
        .parse::<i32>()
        .map_err(|_| SimError::Parse(format!("malformed immediate '{}' in '{}'", token, raw)))
}

/// Parses the `imm(base)` addressing form of loads and stores.
fn parse_offset_base(token: &str, raw: &str) -> Result<(i32, usize), SimError> {
    let open = token.find('(');
    let close = token.rfind(')');
    let (open, close) = match (open, close) {
        (Some(o), Some(c)) if o < c => (o, c),
        _ => {
            return Err(SimError::Parse(format!(
                "malformed address operand '{}' in '{}'",
                token, raw
            )))
        }
    };

    let offset_str = token[..open].trim();
    let imm = if offset_str.is_empty() {
        0
    } else {
        parse_immediate(offset_str, raw)?
    };
    let base = parse_register(token[open + 1..close].trim(), raw)?;
    Ok((imm, base))
}

fn strip_label(token: &str) -> String {
    token.strip_prefix('.').unwrap_or(token).to_string()
}
