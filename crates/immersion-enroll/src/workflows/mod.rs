//! Workflow modules. `enrollment` carries the whole student-facing flow and
//! the registrar console.

pub mod enrollment;
