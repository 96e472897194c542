//! Face anonymization for recorded videos.
//!
//! A job decodes a video, detects and tracks faces frame by frame,
//! pixelates the tracked regions and re-encodes the result while the audio
//! track is copied through untouched. Start from
//! [`pipeline::anonymize_faces_use_case::AnonymizeFacesUseCase`] or
//! [`pipeline::job::spawn_job`].

pub mod shared {
    pub mod audio_sample;
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod geometry;
    pub mod orientation;
    pub mod region;
    pub mod video_asset;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_observation;
        pub mod face_tracker;
        pub mod observation_filter;
    }
    pub mod infrastructure;
}

pub mod compositing {
    pub mod domain {
        pub mod region_compositor;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod frame_sink;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod anonymize_faces_use_case;
    pub mod frame_anonymizer;
    pub mod input_validator;
    pub mod job;
    pub mod output_result;
    pub mod pipeline_executor;
    pub mod pipeline_logger;
    pub mod processing_config;

    pub mod infrastructure {
        pub mod threaded_pipeline_executor;
    }

    #[cfg(test)]
    pub(crate) mod test_doubles;
}
