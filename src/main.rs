// The MIT License (MIT)
//
// Copyright (c) 2016 AT&T
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

extern crate mesos_http_scheduler;

#[macro_use]
extern crate clap;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

use std::process;
use std::sync::{Arc, Mutex};
use std::thread;

use clap::{App, Arg};
use mesos_http_scheduler::protocol::{id_value, object};
use mesos_http_scheduler::{ClientConfig, Endpoint, Event, EventKind, FrameworkIdentity, MesosClient, Offer,
                           SchedulerDriver};
use rustc_serialize::json::Json;
use uuid::Uuid;

const DEFAULT_CPUS: f64 = 0.1;
const DEFAULT_MEM: f64 = 32.0;

lazy_static! {
    static ref DRIVER: Arc<Mutex<Option<SchedulerDriver>>> = {
        Arc::new(Mutex::new(None))
    };
}

fn set_driver(driver_to_set: Option<SchedulerDriver>) {
    let mut driver = DRIVER.lock().unwrap();
    *driver = driver_to_set;
}

fn kill_task(agent_id: &str, task_id: &str) {
    let driver = DRIVER.lock().unwrap();

    if let Some(ref driver) = *driver {
        match driver.kill(agent_id, task_id) {
            Ok(()) => info!("kill requested for task {}", task_id),
            Err(err) => error!("unable to kill task {}: {}", task_id, err),
        }
    }
}

fn main() {
    env_logger::init();

    let matches = App::new("Mesos HTTP Sample Framework")
        .about("Registers with a Mesos master over the v1 scheduler API and runs a command")
        .version(&crate_version!()[..])
        .arg(Arg::with_name("MASTER")
            .short("m")
            .long("master")
            .required_unless("CONFIG")
            .multiple(true)
            .number_of_values(1)
            .help("Master URL, host:port or zk://ensemble/prefix (repeatable)")
            .takes_value(true))
        .arg(Arg::with_name("CONFIG")
            .short("c")
            .long("config")
            .required(false)
            .help("Path to configuration file")
            .takes_value(true))
        .arg(Arg::with_name("NAME")
            .short("n")
            .long("name")
            .required(false)
            .help("Framework name")
            .takes_value(true))
        .arg(Arg::with_name("USER")
            .short("u")
            .long("user")
            .required(false)
            .help("User tasks run as")
            .takes_value(true))
        .arg(Arg::with_name("ROLE")
            .short("r")
            .long("role")
            .required(false)
            .help("Role to subscribe with")
            .takes_value(true))
        .arg(Arg::with_name("COMMAND")
            .long("command")
            .required(false)
            .help("Shell command to launch on the first offer of each batch")
            .takes_value(true))
        .arg(Arg::with_name("KILL_RUNNING")
            .long("kill-running")
            .required(false)
            .help("Kill tasks as soon as they report TASK_RUNNING"))
        .get_matches();

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => {
            info!("config file: {}", path);
            match ClientConfig::from_yaml_file(path) {
                Ok(config) => config,
                Err(err) => exit_with(&format!("{}", err)),
            }
        }
        None => ClientConfig::new(vec![], FrameworkIdentity::default()),
    };

    if let Some(masters) = matches.values_of("MASTER") {
        let masters: Result<Vec<Endpoint>, _> = masters.map(Endpoint::parse).collect();
        match masters {
            Ok(masters) => config.masters = masters,
            Err(err) => exit_with(&format!("{}", err)),
        }
    }
    if let Some(name) = matches.value_of("NAME") {
        config.framework.name = name.to_string();
    }
    if let Some(user) = matches.value_of("USER") {
        config.framework.user = user.to_string();
    }
    if let Some(role) = matches.value_of("ROLE") {
        config.framework.role = Some(role.to_string());
    }
    for master in &config.masters {
        info!("master endpoint: {}", master);
    }

    let client = match MesosClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(err) => exit_with(&format!("{}", err)),
    };
    register_handlers(&client,
                      matches.value_of("COMMAND").map(|command| command.to_string()),
                      matches.is_present("KILL_RUNNING"));

    let scheduler_client = client.clone();
    let scheduler = thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || scheduler_client.register());

    let termination = match scheduler.map(|handle| handle.join()) {
        Ok(Ok(termination)) => termination,
        _ => exit_with("scheduler thread died"),
    };
    info!("scheduler finished: {:?}", termination);
    process::exit(if termination.succeeded() { 0 } else { 1 });
}

fn exit_with(message: &str) -> ! {
    error!("{}", message);
    eprintln!("{}", message);
    process::exit(2)
}

fn register_handlers(client: &MesosClient, command: Option<String>, kill_running: bool) {
    client.on(EventKind::Subscribed, |event: &Event| {
        if let Event::Subscribed(ref driver) = *event {
            info!("subscribed as framework {:?}", driver.framework_id());
            set_driver(Some(driver.clone()));
        }
        Ok(())
    });

    client.on(EventKind::Offers, move |event: &Event| {
        if let Event::Offers(ref offers) = *event {
            handle_offers(offers, command.as_ref().map(|command| command.as_str()))?;
        }
        Ok(())
    });

    client.on(EventKind::Update, move |event: &Event| {
        if let Event::Update(ref status) = *event {
            info!("received update {} from {}", status.state(), status.task_id());
            if kill_running && status.state() == "TASK_RUNNING" {
                if let Some(agent_id) = status.agent_id() {
                    kill_task(agent_id, status.task_id());
                }
            }
        }
        Ok(())
    });

    client.on(EventKind::Rescind, |_: &Event| {
        info!("received rescind");
        Ok(())
    });
    client.on(EventKind::Message, |_: &Event| {
        info!("received message");
        Ok(())
    });
    client.on(EventKind::Failure, |event: &Event| {
        warn!("received failure {:?}", event);
        Ok(())
    });
    client.on(EventKind::Error, |event: &Event| {
        error!("received error {:?}", event);
        Ok(())
    });
    client.on(EventKind::Heartbeat, |_: &Event| {
        debug!("received heartbeat");
        Ok(())
    });
    client.on(EventKind::Disconnected, |event: &Event| {
        warn!("{:?}", event);
        set_driver(None);
        Ok(())
    });
    client.on(EventKind::Reconnected, |event: &Event| {
        info!("{:?}", event);
        Ok(())
    });
}

fn handle_offers(offers: &[Offer], command: Option<&str>) -> Result<(), mesos_http_scheduler::CallError> {
    let (first, rest) = match offers.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };

    match command {
        Some(command) if fits(first) => {
            let task = command_task(command);
            info!("launching {} on agent {}", command, first.agent_id());
            first.accept(vec![task])?;
        }
        _ => first.decline()?,
    }

    if !rest.is_empty() {
        let declined = rest.iter().map(|offer| offer.id().to_string()).collect();
        first.driver().decline(declined, None)?;
    }
    Ok(())
}

fn fits(offer: &Offer) -> bool {
    let mut offer_cpus: f64 = 0.0;
    let mut offer_mem: f64 = 0.0;

    if let Some(resources) = offer.raw().find("resources").and_then(|resources| resources.as_array()) {
        for resource in resources {
            let value = resource.find_path(&["scalar", "value"]).and_then(|value| value.as_f64()).unwrap_or(0.0);
            match resource.find("name").and_then(|name| name.as_string()) {
                Some("mem") => offer_mem += value,
                Some("cpus") => offer_cpus += value,
                _ => {}
            }
        }
    }
    offer_cpus >= DEFAULT_CPUS && offer_mem >= DEFAULT_MEM
}

fn scalar(name: &str, value: f64) -> Json {
    object(vec![
        ("name", Json::String(name.to_string())),
        ("type", Json::String("SCALAR".to_string())),
        ("scalar", object(vec![("value", Json::F64(value))])),
    ])
}

fn command_task(command: &str) -> Json {
    let task_id = format!("sample-{}", Uuid::new_v4());
    object(vec![
        ("name", Json::String(task_id.clone())),
        ("task_id", id_value(&task_id)),
        ("resources", Json::Array(vec![scalar("cpus", DEFAULT_CPUS), scalar("mem", DEFAULT_MEM)])),
        ("command", object(vec![("shell", Json::Boolean(true)), ("value", Json::String(command.to_string()))])),
    ])
}
