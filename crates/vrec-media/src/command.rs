//! FFmpeg decode command builder.

use vrec_models::SamplingPolicy;

/// Builder for an FFmpeg invocation that reads a container from stdin and
/// writes sampled raw RGB frames to stdout.
#[derive(Debug, Clone)]
pub struct DecodeCommand {
    sampling: SamplingPolicy,
    /// Log level
    log_level: String,
    /// Filters appended after the sampling filter
    extra_filters: Vec<String>,
}

impl DecodeCommand {
    /// Create a new decode command.
    pub fn new(sampling: SamplingPolicy) -> Self {
        Self {
            sampling,
            log_level: "error".to_string(),
            extra_filters: Vec::new(),
        }
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Append a filter to the video filter chain.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.extra_filters.push(filter.into());
        self
    }

    /// Filter that implements the sampling policy, if any is needed.
    pub fn sampling_filter(&self) -> Option<String> {
        match self.sampling {
            SamplingPolicy::FrameStep(n) if n <= 1 => None,
            SamplingPolicy::FrameStep(n) => Some(format!("select=not(mod(n\\,{}))", n)),
            SamplingPolicy::Rate(fps) => Some(format!("fps={}", fps)),
        }
    }

    /// Full `-vf` chain, if any.
    pub fn video_filter(&self) -> Option<String> {
        let chain: Vec<String> = self
            .sampling_filter()
            .into_iter()
            .chain(self.extra_filters.iter().cloned())
            .collect();
        if chain.is_empty() {
            None
        } else {
            Some(chain.join(","))
        }
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
            // Frame size comes from the probe, which reports the stored,
            // unrotated dimensions.
            "-noautorotate".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-an".to_string(),
            "-sn".to_string(),
        ];

        if let Some(filter) = self.video_filter() {
            args.push("-vf".to_string());
            args.push(filter);
        }

        // Selected frames keep their timestamps; never duplicate to fill gaps.
        if matches!(self.sampling, SamplingPolicy::FrameStep(n) if n > 1) {
            args.push("-fps_mode".to_string());
            args.push("vfr".to_string());
        }

        args.extend(
            ["-pix_fmt", "rgb24", "-f", "rawvideo", "pipe:1"]
                .into_iter()
                .map(String::from),
        );
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_step_uses_select_filter() {
        let args = DecodeCommand::new(SamplingPolicy::FrameStep(200)).build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "select=not(mod(n\\,200))");
        assert!(args.contains(&"vfr".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_rate_uses_fps_filter() {
        let cmd = DecodeCommand::new(SamplingPolicy::Rate(0.5));
        assert_eq!(cmd.video_filter().as_deref(), Some("fps=0.5"));
        assert!(!cmd.build_args().contains(&"-fps_mode".to_string()));
    }

    #[test]
    fn test_every_frame_needs_no_filter() {
        let args = DecodeCommand::new(SamplingPolicy::FrameStep(1)).build_args();
        assert!(!args.contains(&"-vf".to_string()));
        let args = DecodeCommand::new(SamplingPolicy::FrameStep(1))
            .filter("scale=1280:-2")
            .build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=1280:-2");
    }

    #[test]
    fn test_reads_stdin_and_writes_rgb() {
        let args = DecodeCommand::new(SamplingPolicy::default()).build_args();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "pipe:0");
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "rgb24"));
    }

    #[test]
    fn test_rotation_metadata_ignored() {
        let args = DecodeCommand::new(SamplingPolicy::default()).build_args();
        let noautorotate = args.iter().position(|a| a == "-noautorotate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(noautorotate < input);
    }
}
