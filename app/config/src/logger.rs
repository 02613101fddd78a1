// Copyright 2022 SphereEx Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::str::FromStr;

use tracing::Level;

/// Installs the global fmt subscriber. An unknown level disables logging,
/// a second call is a no-op.
pub fn init(log_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::from_str(log_level).ok())
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod test {
    use super::init;

    #[test]
    fn test_init_twice() {
        init("DEBUG");
        init("INFO");
        tracing::info!("logger initialised");
    }
}
