//! Interactive console for a Marantz/Denon receiver.
//!
//! Run with `cargo run --example console [--debug] [host]`. Without a host
//! the receivers on the local network are discovered and listed first.

use mdavr::{AvrClient, DiscoveredDevice, Discovery, Zone};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::timeout;

const HELP: &str = "\
Commands:
  on | off                      main power
  zone <2|3> on|off             zone power
  mute on|off [zone]            mute
  vol <level>|up|down [zone]    volume
  src <input> [zone]            select input, e.g. `src Media Player`
  sound <mode>                  sound mode, e.g. `sound Movie`
  picture <mode>                picture mode
  eco on|off|auto               eco mode
  bias <channel> <level|up|down>  channel bias, e.g. `bias Subwoofer 1.5`
  bias reset                    reset all channel levels
  lists                         show selectable inputs and modes
  status                        show the device state as JSON
  refresh                       query the full state again
  help | quit";

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let host = args.iter().find(|a| !a.starts_with("--")).cloned();

    tracing_subscriber::fmt()
        .with_max_level(if debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let avr = match host {
        Some(host) => AvrClient::connect(host.clone(), host).await?,
        None => match choose_device(&mut input).await? {
            Some(device) => {
                println!("Connecting to {} at {}...", device.name, device.ip);
                device.connect().await?
            }
            None => return Ok(()),
        },
    };

    if debug {
        avr.subscribe(|field, value| println!("  {} = {}", field, value));
    }

    println!("Connected to {}. Type `help` for commands.", avr.name());
    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if !avr.is_alive() {
            println!("The session has closed");
            break;
        }
        if let Err(e) = run_command(&avr, line) {
            println!("Error: {}", e);
        }
    }

    avr.close();
    Ok(())
}

async fn choose_device(
    input: &mut Input,
) -> Result<Option<DiscoveredDevice>, Box<dyn std::error::Error>> {
    let mut discovery = Discovery::new();
    let mut found = discovery.subscribe_updates();
    discovery.start();

    println!("Searching for receivers...");
    // Collect for a few seconds; the listing can be refreshed with `r`
    let _ = timeout(Duration::from_secs(5), async {
        while let Ok(device) = found.recv().await {
            println!("  found {} ({}) at {}", device.name, device.model, device.ip);
        }
    })
    .await;

    loop {
        let devices = discovery.devices();
        if devices.is_empty() {
            println!("No receivers found. Press enter to search again or `q` to quit.");
        } else {
            for (i, device) in devices.iter().enumerate() {
                println!(
                    "[{}] {} - {} {} at {}",
                    i + 1,
                    device.name,
                    device.brand,
                    device.model,
                    device.ip
                );
            }
            println!("Select a receiver by number, `r` to refresh or `q` to quit.");
        }

        let Some(line) = input.next_line().await? else {
            break;
        };
        match line.trim() {
            "q" | "quit" => break,
            "" | "r" => continue,
            choice => match choice.parse::<usize>() {
                Ok(n) if (1..=devices.len()).contains(&n) => {
                    discovery.stop().await;
                    return Ok(Some(devices[n - 1].clone()));
                }
                _ => println!("Invalid choice: {}", choice),
            },
        }
    }

    discovery.stop().await;
    Ok(None)
}

fn parse_zone(arg: Option<&str>) -> Result<Zone, String> {
    match arg {
        None | Some("main") | Some("1") => Ok(Zone::Main),
        Some("2") | Some("zone2") => Ok(Zone::Zone2),
        Some("3") | Some("zone3") => Ok(Zone::Zone3),
        Some(other) => Err(format!("unknown zone {}", other)),
    }
}

fn parse_switch(arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("expected on or off".to_string()),
    }
}

fn run_command(avr: &AvrClient, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match command {
        "help" => println!("{}", HELP),
        "on" => avr.turn_on()?,
        "off" => avr.turn_off()?,
        "zone" => {
            let zone = parse_zone(args.first().copied())?;
            if parse_switch(args.get(1).copied())? {
                avr.zone_turn_on(zone)?;
            } else {
                avr.zone_turn_off(zone)?;
            }
        }
        "mute" => {
            let mute = parse_switch(args.first().copied())?;
            avr.zone_mute_volume(parse_zone(args.get(1).copied())?, mute)?;
        }
        "vol" => {
            let zone = parse_zone(args.get(1).copied())?;
            match args.first().copied() {
                Some("up") => avr.zone_volume_up(zone)?,
                Some("down") => avr.zone_volume_down(zone)?,
                Some(level) => avr.zone_set_volume(zone, level.parse()?)?,
                None => println!("Volume: {:?}", avr.zone_volume(zone)),
            }
        }
        "src" => {
            // A trailing zone number is optional, input names contain spaces
            let (name, zone) = match args.split_last() {
                Some((&last, init)) if !init.is_empty() && parse_zone(Some(last)).is_ok() => {
                    (init.join(" "), parse_zone(Some(last))?)
                }
                _ => (args.join(" "), Zone::Main),
            };
            avr.zone_select_source(zone, &name)?;
        }
        "sound" => avr.select_sound_mode(rest.trim())?,
        "picture" => avr.select_picture_mode(rest.trim())?,
        "eco" => avr.select_eco_mode(rest.trim())?,
        "bias" => match args.split_last() {
            Some((&"reset", [])) => avr.channels_bias_reset()?,
            Some((&"up", channel)) => avr.channel_bias_up(&channel.join(" "))?,
            Some((&"down", channel)) => avr.channel_bias_down(&channel.join(" "))?,
            Some((level, channel)) if !channel.is_empty() => {
                avr.set_channel_bias(&channel.join(" "), level.parse()?)?
            }
            _ => println!("Channels: {:?}", avr.channels_bias()),
        },
        "lists" => {
            let sources: Vec<String> = avr.source_list().iter().map(|s| s.to_string()).collect();
            println!("Inputs: {}", sources.join(", "));
            let modes: Vec<&str> = avr.sound_mode_list().iter().map(|m| m.label()).collect();
            println!("Sound modes: {}", modes.join(", "));
            let modes: Vec<&str> = avr.picture_mode_list().iter().map(|m| m.label()).collect();
            println!("Picture modes: {}", modes.join(", "));
            let channels: Vec<String> =
                avr.channels_bias_list().iter().map(|c| c.to_string()).collect();
            println!("Channels: {}", channels.join(", "));
        }
        "status" => println!("{}", serde_json::to_string_pretty(&avr.status())?),
        "refresh" => avr.refresh()?,
        _ => println!("Unknown command `{}`, try `help`", command),
    }
    Ok(())
}
