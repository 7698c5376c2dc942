// The MIT License (MIT)

// Copyright (c) 2026 Strand Developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Senders waking in sleep order, not spawn order.

use std::time::Duration;

use strand::{Channel, Deadline};

fn main() {
    env_logger::init();

    let ch = Channel::<&'static str>::new();

    for (ms, who) in [(30, "slow"), (10, "quick"), (20, "middling")] {
        let tx = ch.clone();
        strand::spawn(move || {
            strand::sleep(Duration::from_millis(ms)).unwrap();
            tx.send(who, Deadline::NEVER).unwrap();
        })
        .unwrap();
    }

    for _ in 0..3 {
        println!("{} woke up", ch.receive(Deadline::NEVER).unwrap());
    }
}
