use remip_client::{Coefficient, Constraint, Objective, Parameters, Problem, RemipClient, Variable};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create a client (adjust URL as needed)
    let client = RemipClient::new("http://127.0.0.1:9000")?;

    // Check if the server is healthy
    match client.health_check().await {
        Ok(true) => println!("✓ Server is healthy"),
        Ok(false) => println!("⚠ Server returned non-success status"),
        Err(e) => println!("✗ Health check failed: {}", e),
    }

    // maximize x + 2y  s.t.  x + y <= 4, x, y in [0, 3]
    let variable = |name: &str| Variable {
        name: name.to_string(),
        low_bound: Some(0.0),
        up_bound: Some(3.0),
        cat: "Continuous".to_string(),
        var_value: None,
        dj: None,
    };
    let coefficient = |name: &str, value: f64| Coefficient {
        name: name.to_string(),
        value,
    };

    let problem = Problem {
        objective: Objective {
            name: Some("OBJ".to_string()),
            coefficients: vec![coefficient("x", 1.0), coefficient("y", 2.0)],
        },
        constraints: vec![Constraint {
            name: "capacity".to_string(),
            sense: -1,
            constant: -4.0,
            coefficients: vec![coefficient("x", 1.0), coefficient("y", 1.0)],
            pi: None,
        }],
        variables: vec![variable("x"), variable("y")],
        parameters: Parameters {
            name: "example".to_string(),
            sense: -1,
            status: 0,
            sol_status: 0,
        },
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("  {:?}", event);
        }
    });

    let solution = client.solve(&problem, Some(30), Some(&tx)).await?;
    drop(tx);
    printer.await?;

    match solution {
        Some(solution) => {
            println!("Status: {}", solution.status);
            println!("Objective: {:?}", solution.objective_value);
            println!("Variables: {:?}", solution.variables);
        }
        None => println!("Solver did not produce a solution"),
    }

    Ok(())
}
