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

//! Two coroutines bouncing a counter over a pair of rendezvous channels.

use strand::{Channel, Deadline};

fn main() {
    env_logger::init();

    let ping = Channel::<u32>::new();
    let pong = Channel::<u32>::new();

    let ping_rx = ping.clone();
    let pong_tx = pong.clone();
    strand::spawn(move || {
        while let Ok(n) = ping_rx.receive(Deadline::NEVER) {
            println!("ping {}", n);
            if pong_tx.send(n + 1, Deadline::NEVER).is_err() {
                break;
            }
        }
    })
    .unwrap();

    for round in 0..5 {
        ping.send(round * 2, Deadline::NEVER).unwrap();
        let back = pong.receive(Deadline::NEVER).unwrap();
        println!("pong {}", back);
    }

    ping.done();
    pong.done();
}
