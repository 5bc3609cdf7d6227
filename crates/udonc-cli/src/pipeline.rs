//! Wires ingestion through structural recovery into rendered source text
//! for a single program bundle, grounded on `__main__.py`'s
//! `decompile_program_to_source` / `process_file`.
//!
//! Per-program fatal errors (§7) are surfaced as [`anyhow::Error`] so a
//! batch run can log one failure and continue with the next file — the
//! source this was distilled from aborts the whole batch on the first
//! failure; this is a deliberate deviation (see DESIGN.md).

use std::path::Path;

use anyhow::Context;

use udonc_analysis::{CfgBuilder, ExpressionBuilder, StackSimulator, VariableIdentifier, VariableTable};
use udonc_emit::{collect_global_variables, resolve_class_name, ClassNameAllocator, CodeEmitter};
use udonc_ingest::{load_module_info_from_file, load_program_from_file};
use udonc_model::{Diagnostics, UdonModuleInfo, UdonProgramData};
use udonc_recover::{FunctionRecoverer, ProgramNode};

/// The rendered source for one program bundle, plus whatever the recovery
/// pipeline degraded along the way.
pub struct DecompiledUnit {
    pub class_name: String,
    pub source: String,
    pub diagnostics: Diagnostics,
}

pub fn load_module_info(path: &Path) -> anyhow::Result<UdonModuleInfo> {
    load_module_info_from_file(path)
        .with_context(|| format!("loading module descriptor {}", path.display()))
}

pub fn decompile_file(
    path: &Path,
    module_info: &UdonModuleInfo,
    allocator: &mut ClassNameAllocator,
) -> anyhow::Result<DecompiledUnit> {
    let program = load_program_from_file(path)
        .with_context(|| format!("loading program bundle {}", path.display()))?;
    decompile_program(program, module_info, allocator)
        .with_context(|| format!("decompiling {}", path.display()))
}

/// Runs a loaded program bundle through CFG construction, simulation,
/// variable identification, expression reconstruction, structural
/// recovery, and emission. Split out from [`decompile_file`] so the
/// pipeline can be driven directly from an in-memory bundle, without file
/// I/O, in tests.
pub fn decompile_program(
    mut program: UdonProgramData,
    module_info: &UdonModuleInfo,
    allocator: &mut ClassNameAllocator,
) -> anyhow::Result<DecompiledUnit> {
    let mut diagnostics = Diagnostics::new();
    let cfgs = CfgBuilder::new(&mut program, module_info, &mut diagnostics)
        .build()
        .context("building control-flow graphs")?;

    let mut function_nodes = Vec::with_capacity(cfgs.len());
    let mut variable_tables: Vec<VariableTable> = Vec::with_capacity(cfgs.len());

    for cfg in &cfgs {
        let sim = StackSimulator::new(&program, module_info).simulate(cfg);
        let variables = VariableIdentifier::new(&program, module_info).identify(cfg, &sim);
        let expressions =
            ExpressionBuilder::new(&program, module_info, &variables).build(cfg, &sim, &mut diagnostics);

        let function_node = FunctionRecoverer::new(
            cfg,
            &expressions,
            &variables,
            &sim,
            &program,
            module_info,
            &mut diagnostics,
        )
        .build();

        function_nodes.push(function_node);
        variable_tables.push(variables);
    }

    let class_name = resolve_class_name(&program, allocator);
    let table_refs: Vec<&VariableTable> = variable_tables.iter().collect();
    let global_variables = collect_global_variables(&program, &table_refs);

    let program_node = ProgramNode {
        class_name: Some(class_name.clone()),
        global_variables,
        functions: function_nodes,
    };

    let source = CodeEmitter::new().generate(&program_node);

    Ok(DecompiledUnit {
        class_name,
        source,
        diagnostics,
    })
}
