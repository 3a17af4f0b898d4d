//! Integration tests: extracting the linear system of a mode's dynamics
//! against the declared-variable order.

use hybra_ir::dynamics::{extract_matrix_a, extract_vector_b};
use hybra_ir::util::make_debug_configuration;
use hybra_ir::ExportError;

#[test]
fn test_extract_linear_system_of_mode() {
    let config = make_debug_configuration(&[
        ("x", "2 * x - 3 * y + 5", "0"),
        ("y", "x", "0"),
    ]);
    let mode = config.root.mode("on").unwrap();

    let a = extract_matrix_a(&config.root, mode).unwrap();
    assert_eq!(a, vec![vec![2.0, -3.0], vec![1.0, 0.0]]);

    let b = extract_vector_b(&config.root, mode).unwrap();
    assert_eq!(b, vec![5.0, 0.0]);
}

#[test]
fn test_row_order_follows_declared_variables() {
    // same dynamics, opposite declaration order: rows and columns swap
    let config = make_debug_configuration(&[
        ("y", "x", "0"),
        ("x", "2 * x - 3 * y + 5", "0"),
    ]);
    let mode = config.root.mode("on").unwrap();

    let a = extract_matrix_a(&config.root, mode).unwrap();
    assert_eq!(a, vec![vec![0.0, 1.0], vec![-3.0, 2.0]]);

    let b = extract_vector_b(&config.root, mode).unwrap();
    assert_eq!(b, vec![0.0, 5.0]);
}

#[test]
fn test_nonlinear_dynamics_fail_with_diagnostic() {
    let config = make_debug_configuration(&[("x", "x * y", "0"), ("y", "1", "0")]);
    let mode = config.root.mode("on").unwrap();

    let err = extract_matrix_a(&config.root, mode).unwrap_err();
    let ExportError::LinearCoefficient { var, expr, .. } = err else {
        panic!("expected a coefficient-extraction diagnostic, got {}", err);
    };
    assert_eq!(var, "x");
    assert_eq!(expr, "x * y");
}

#[test]
fn test_interval_flows_extract_from_the_expression() {
    // linear extraction reads the expression part of a flow; uncertainty
    // intervals on the flow are the caller's concern
    let mut config = make_debug_configuration(&[("x", "-1 * x", "0")]);
    config
        .root
        .mode_mut("on")
        .unwrap()
        .flow
        .get_mut("x")
        .unwrap()
        .interval = Some(hybra_ir::Interval::new(-0.1, 0.1));
    let mode = config.root.mode("on").unwrap();

    assert_eq!(extract_matrix_a(&config.root, mode).unwrap(), vec![vec![-1.0]]);
    assert_eq!(extract_vector_b(&config.root, mode).unwrap(), vec![0.0]);
}
