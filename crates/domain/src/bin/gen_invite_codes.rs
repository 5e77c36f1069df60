use std::env;
use std::process;

use portal_domain::model::generate_invite_code;

fn main() {
    let count = match env::args().nth(1) {
        None => 1,
        Some(raw) => match raw.parse::<usize>() {
            Ok(count) if count > 0 => count,
            _ => {
                eprintln!("Usage: gen_invite_codes [count]");
                process::exit(1);
            }
        },
    };

    for _ in 0..count {
        match generate_invite_code() {
            Ok(code) => println!("{code}"),
            Err(err) => {
                eprintln!("failed to generate invite code: {err}");
                process::exit(1);
            }
        }
    }
}
