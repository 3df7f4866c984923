use axb::{axb, AxbConfig, AxbDescriptor, AxbMethod, Mask, Matrix, Semiring};

fn main() -> axb::Result<()> {
    println!("AxB {}: semiring sparse matrix multiply", axb::VERSION);

    let a = Matrix::from_triplets(
        3,
        3,
        &[(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0), (2, 0, 4.0), (2, 2, 5.0)],
    )?;
    let b = Matrix::from_triplets(3, 3, &[(0, 0, 7.0), (2, 0, 8.0), (0, 1, 9.0), (1, 2, 10.0)])?;
    println!("\nMatrix A:\n{:?}", a);
    println!("Matrix B:\n{:?}", b);

    let config = AxbConfig::default();
    println!("\nDefault configuration:");
    println!("  Threads: {}", config.system_params.n_threads);
    println!("  Chunk: {}", config.system_params.chunk);

    for (name, semiring) in [
        ("plus_times", Semiring::plus_times()),
        ("min_plus", Semiring::min_plus()),
        ("max_times", Semiring::max_times()),
    ] {
        for method in [AxbMethod::Default, AxbMethod::Dot, AxbMethod::Hash, AxbMethod::Gustavson] {
            let desc = AxbDescriptor {
                method,
                sort: true,
                ..Default::default()
            };
            let out = axb(None, None, None, &semiring, &a, &b, &desc, &config)?;
            if let Some(c) = out.result {
                println!(
                    "{:<10} {:<10?} via {:<12} nvals={} C={:?}",
                    name,
                    method,
                    out.method.name(),
                    c.nvals(),
                    c.sorted_entries()
                );
            }
        }
    }

    let m = Matrix::from_triplets(3, 3, &[(0, 0, true), (2, 2, true)])?;
    let mask = Mask::new(&m);
    let desc = AxbDescriptor {
        sort: true,
        ..Default::default()
    };
    let out = axb(None, Some(&mask), None, &Semiring::plus_times(), &a, &b, &desc, &config)?;
    if let Some(c) = out.result {
        println!("\nC<M> = A*B via {}: {:?}", out.method.name(), c.sorted_entries());
    }
    Ok(())
}
