//! AWS-backed implementations of the fleet API traits.
//!
//! Auto Scaling for the groups themselves, Elastic Beanstalk for the
//! environment health grades. Credentials and region come from the
//! standard AWS provider chain.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use tracing::debug;

use stackpause_core::Capacity;

use crate::api::{EnvironmentApi, EnvironmentHealth, ScalingApi, ScalingGroup};
use crate::error::{FleetError, FleetResult};

/// Load the shared AWS config from the environment.
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

#[derive(Clone)]
pub struct AwsScalingApi {
    client: aws_sdk_autoscaling::Client,
}

impl AwsScalingApi {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_autoscaling::Client::new(config),
        }
    }
}

#[async_trait]
impl ScalingApi for AwsScalingApi {
    async fn describe_groups(&self) -> FleetResult<Vec<ScalingGroup>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_auto_scaling_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| connectivity("describe auto scaling groups", e))?;

            for group in output.auto_scaling_groups() {
                let tags: BTreeMap<String, String> = group
                    .tags()
                    .iter()
                    .filter_map(|t| Some((t.key()?.to_string(), t.value()?.to_string())))
                    .collect();

                groups.push(ScalingGroup {
                    name: group.auto_scaling_group_name().unwrap_or_default().to_string(),
                    tags,
                    capacity: Capacity {
                        min_size: from_i32(group.min_size()),
                        max_size: from_i32(group.max_size()),
                        desired_capacity: from_i32(group.desired_capacity()),
                    },
                    instance_count: group.instances().len() as u32,
                    suspended_processes: group
                        .suspended_processes()
                        .iter()
                        .filter_map(|p| p.process_name().map(str::to_string))
                        .collect(),
                    metrics_enabled: !group.enabled_metrics().is_empty(),
                });
            }

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(groups = groups.len(), "auto scaling groups listed");
        Ok(groups)
    }

    async fn suspend_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()> {
        self.client
            .suspend_processes()
            .auto_scaling_group_name(group)
            .set_scaling_processes(Some(processes.iter().map(|p| p.to_string()).collect()))
            .send()
            .await
            .map_err(|e| connectivity("suspend processes", e))?;
        Ok(())
    }

    async fn resume_processes(&self, group: &str, processes: &[&str]) -> FleetResult<()> {
        self.client
            .resume_processes()
            .auto_scaling_group_name(group)
            .set_scaling_processes(Some(processes.iter().map(|p| p.to_string()).collect()))
            .send()
            .await
            .map_err(|e| connectivity("resume processes", e))?;
        Ok(())
    }

    async fn disable_metrics_collection(&self, group: &str) -> FleetResult<()> {
        self.client
            .disable_metrics_collection()
            .auto_scaling_group_name(group)
            .send()
            .await
            .map_err(|e| connectivity("disable metrics collection", e))?;
        Ok(())
    }

    async fn enable_metrics_collection(&self, group: &str, granularity: &str) -> FleetResult<()> {
        self.client
            .enable_metrics_collection()
            .auto_scaling_group_name(group)
            .granularity(granularity)
            .send()
            .await
            .map_err(|e| connectivity("enable metrics collection", e))?;
        Ok(())
    }

    async fn update_capacity(&self, group: &str, capacity: Capacity) -> FleetResult<()> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(group)
            .min_size(to_i32(capacity.min_size))
            .max_size(to_i32(capacity.max_size))
            .desired_capacity(to_i32(capacity.desired_capacity))
            .send()
            .await
            .map_err(|e| connectivity("update auto scaling group", e))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AwsEnvironmentApi {
    client: aws_sdk_elasticbeanstalk::Client,
}

impl AwsEnvironmentApi {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_elasticbeanstalk::Client::new(config),
        }
    }
}

#[async_trait]
impl EnvironmentApi for AwsEnvironmentApi {
    async fn describe_environments(&self) -> FleetResult<Vec<EnvironmentHealth>> {
        let output = self
            .client
            .describe_environments()
            .send()
            .await
            .map_err(|e| connectivity("describe environments", e))?;

        Ok(output
            .environments()
            .iter()
            .filter_map(|e| {
                Some(EnvironmentHealth {
                    name: e.environment_name()?.to_string(),
                    health: e
                        .health()
                        .map(|h| h.as_str().to_string())
                        .unwrap_or_else(|| crate::registry::UNKNOWN_HEALTH.to_string()),
                })
            })
            .collect())
    }
}

fn connectivity<E>(operation: &str, err: E) -> FleetError
where
    E: std::error::Error,
{
    FleetError::Connectivity(format!("{operation}: {}", DisplayErrorContext(&err)))
}

fn from_i32(value: Option<i32>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
