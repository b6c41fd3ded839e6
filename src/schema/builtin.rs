//! Built-in component definitions
//!
//! Covers the simulation and GWF model name files, temporal discretization,
//! and a structured-grid flow model's dis, ic, sto and chd packages.

use super::{BlockSpec, ComponentKind, ComponentSpec, Schema};
use crate::types::{
    ColumnDef, Dim, ExtensionDef, KeystringDef, ListDef, NumKind, ParamSpec, Presence, ScalarKind,
};

/// Schema holding every built-in component
pub fn builtin() -> Schema {
    Schema::new()
        .with(sim_nam())
        .with(sim_tdis())
        .with(gwf_nam())
        .with(gwf_dis())
        .with(gwf_ic())
        .with(gwf_sto())
        .with(gwf_chd())
}

fn grid() -> Vec<Dim> {
    vec![Dim::from("nlay"), Dim::from("nrow"), Dim::from("ncol")]
}

fn strings(names: &[&str]) -> Vec<ColumnDef> {
    names
        .iter()
        .map(|n| ColumnDef::new(n, ScalarKind::String))
        .collect()
}

fn sim_nam() -> ComponentSpec {
    ComponentSpec::new("sim-nam", ComponentKind::Simulation)
        .block(
            BlockSpec::new("options")
                .open()
                .param(ParamSpec::keyword("continue"))
                .param(ParamSpec::keyword("nocheck"))
                .param(ParamSpec::string("memory_print_option").optional())
                .param(ParamSpec::integer("maxerrors").optional())
                .param(ParamSpec::keyword("print_input")),
        )
        .block(
            BlockSpec::new("timing")
                .param(
                    ParamSpec::path("tdis6").describe("name of the temporal discretization file"),
                ),
        )
        .block(BlockSpec::new("models").param(ParamSpec::list(
            "models",
            ListDef::new(strings(&["mtype", "mfname", "mname"])),
        )))
        .block(BlockSpec::new("exchanges").param(ParamSpec::list(
            "exchanges",
            ListDef::new(strings(&["exgtype", "exgfile", "exgmnamea", "exgmnameb"])),
        )))
        .block(BlockSpec::new("solutiongroup").indexed().param(ParamSpec::list(
            "solutiongroup",
            ListDef::new(strings(&["slntype", "slnfname", "slnmnames"])),
        )))
}

fn sim_tdis() -> ComponentSpec {
    ComponentSpec::new("sim-tdis", ComponentKind::Package)
        .block(
            BlockSpec::new("options")
                .param(ParamSpec::string("time_units").optional())
                .param(ParamSpec::string("start_date_time").optional()),
        )
        .block(
            BlockSpec::new("dimensions")
                .param(
                    ParamSpec::integer("nper").default(1i64).describe("number of stress periods"),
                ),
        )
        .block(BlockSpec::new("perioddata").param(ParamSpec::list(
            "perioddata",
            ListDef::new(vec![
                ColumnDef::new("perlen", ScalarKind::Double),
                ColumnDef::new("nstp", ScalarKind::Integer),
                ColumnDef::new("tsmult", ScalarKind::Double),
            ]),
        )))
}

fn gwf_nam() -> ComponentSpec {
    ComponentSpec::new("gwf-nam", ComponentKind::Model)
        .block(
            BlockSpec::new("options")
                .open()
                .param(ParamSpec::path("list").optional())
                .param(ParamSpec::keyword("print_input"))
                .param(ParamSpec::keyword("print_flows"))
                .param(ParamSpec::keyword("save_flows"))
                .param(ParamSpec::keyword("newton")),
        )
        .block(BlockSpec::new("packages").param(ParamSpec::list(
            "packages",
            ListDef::new(vec![
                ColumnDef::new("ftype", ScalarKind::String),
                ColumnDef::new("fname", ScalarKind::String),
                ColumnDef::new("pname", ScalarKind::String).optional(),
            ]),
        )))
}

fn gwf_dis() -> ComponentSpec {
    ComponentSpec::new("gwf-dis", ComponentKind::Package)
        .block(
            BlockSpec::new("options")
                .param(ParamSpec::string("length_units").optional())
                .param(ParamSpec::keyword("nogrb"))
                .param(ParamSpec::double("xorigin").optional())
                .param(ParamSpec::double("yorigin").optional())
                .param(ParamSpec::double("angrot").optional())
                .param(ParamSpec::keyword("export_array_ascii")),
        )
        .block(
            BlockSpec::new("dimensions")
                .param(ParamSpec::integer("nlay").default(1i64).describe("number of layers"))
                .param(ParamSpec::integer("nrow").default(1i64).describe("number of rows"))
                .param(ParamSpec::integer("ncol").default(1i64).describe("number of columns")),
        )
        .block(
            BlockSpec::new("griddata")
                .param(
                    ParamSpec::array("delr", NumKind::Double, vec![Dim::from("ncol")])
                        .default(1.0)
                        .describe("spacing along a row"),
                )
                .param(
                    ParamSpec::array("delc", NumKind::Double, vec![Dim::from("nrow")])
                        .default(1.0)
                        .describe("spacing along a column"),
                )
                .param(
                    ParamSpec::array(
                        "top",
                        NumKind::Double,
                        vec![Dim::from("nrow"), Dim::from("ncol")],
                    )
                    .default(1.0)
                    .describe("cell top elevation"),
                )
                .param(
                    ParamSpec::array("botm", NumKind::Double, grid())
                        .layered()
                        .default(0.0)
                        .describe("cell bottom elevation"),
                )
                .param(
                    ParamSpec::array("idomain", NumKind::Integer, grid())
                        .layered()
                        .optional(),
                ),
        )
}

fn gwf_ic() -> ComponentSpec {
    ComponentSpec::new("gwf-ic", ComponentKind::Package)
        .block(BlockSpec::new("options").param(ParamSpec::keyword("export_array_ascii")))
        .block(
            BlockSpec::new("griddata").param(
                ParamSpec::array("strt", NumKind::Double, grid())
                    .layered()
                    .default(1.0)
                    .describe("starting head"),
            ),
        )
}

fn gwf_sto() -> ComponentSpec {
    ComponentSpec::new("gwf-sto", ComponentKind::Package)
        .block(
            BlockSpec::new("options")
                .param(ParamSpec::keyword("save_flows"))
                .param(ParamSpec::keyword("storagecoefficient"))
                .param(ParamSpec::keyword("ss_confined_only")),
        )
        .block(
            BlockSpec::new("griddata")
                .param(
                    ParamSpec::array("iconvert", NumKind::Integer, grid())
                        .layered()
                        .default(0i64),
                )
                .param(ParamSpec::array("ss", NumKind::Double, grid()).layered().default(1e-5))
                .param(ParamSpec::array("sy", NumKind::Double, grid()).layered().default(0.15)),
        )
        .block(
            BlockSpec::new("period").indexed().param(ParamSpec::keystring(
                "storage",
                KeystringDef::new()
                    .variant("steady-state", vec![])
                    .variant("transient", vec![]),
            )),
        )
}

fn gwf_chd() -> ComponentSpec {
    let period = ListDef::new(vec![
        ColumnDef::new("k", ScalarKind::Integer),
        ColumnDef::new("i", ScalarKind::Integer),
        ColumnDef::new("j", ScalarKind::Integer),
        ColumnDef::new("head", ScalarKind::Double),
    ])
    .extension(ExtensionDef::new(
        "aux",
        ScalarKind::Double,
        Presence::Names("auxiliary".into()),
    ))
    .extension(ExtensionDef::new(
        "boundname",
        ScalarKind::String,
        Presence::Flag("boundnames".into()),
    ));

    ComponentSpec::new("gwf-chd", ComponentKind::Package)
        .block(
            BlockSpec::new("options")
                .param(ParamSpec::string("auxiliary").optional())
                .param(ParamSpec::string("auxmultname").optional())
                .param(ParamSpec::keyword("boundnames"))
                .param(ParamSpec::keyword("print_input"))
                .param(ParamSpec::keyword("print_flows"))
                .param(ParamSpec::keyword("save_flows")),
        )
        .block(BlockSpec::new("dimensions").param(ParamSpec::integer("maxbound")))
        .block(
            BlockSpec::new("period")
                .indexed()
                .param(ParamSpec::list("stress_period_data", period)),
        )
}
